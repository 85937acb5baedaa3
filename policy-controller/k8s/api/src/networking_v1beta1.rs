//! The `networking.k8s.io/v1beta1` Ingress API.
//!
//! This version was removed in Kubernetes 1.22 and is no longer provided by
//! `k8s-openapi`, but older clusters still serve it.

use crate::IntOrString;
use k8s_openapi::api::core::v1::TypedLocalObjectReference;

/// Ingress is a collection of rules that allow inbound connections to reach
/// the endpoints defined by a backend.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, serde::Deserialize, serde::Serialize)]
#[kube(
    group = "networking.k8s.io",
    version = "v1beta1",
    kind = "Ingress",
    plural = "ingresses",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// A default backend capable of servicing requests that don't match any
    /// rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<IngressBackend>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,

    /// Host rules used to configure the Ingress. If unspecified, or no rule
    /// matches, all traffic is sent to the default backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<IngressRule>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Vec<IngressTls>>,
}

/// Describes all endpoints for a given service and port.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<IntOrString>,

    /// A reference to another Kubernetes resource in the same namespace. Mutually
    /// exclusive with `serviceName`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<TypedLocalObjectReference>,
}

/// Maps the paths under a host to backends. If the host is unspecified, the
/// rule applies to all inbound HTTP traffic.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpIngressRuleValue>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct HttpIngressRuleValue {
    pub paths: Vec<HttpIngressPath>,
}

/// Associates a path with a backend.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// One of `Exact`, `Prefix`, or `ImplementationSpecific`. Defaults to
    /// `ImplementationSpecific`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_type: Option<String>,

    pub backend: IngressBackend,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}
