#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod networking_v1beta1;

pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Service, ServicePort, ServiceSpec},
        networking::v1 as networking_v1,
    },
    apimachinery::pkg::util::intstr::IntOrString,
};
pub use kube::core::{ObjectMeta, ResourceExt};
