//! Ingress policy index
//!
//! Indexes the Kubernetes resources that ingress policy is derived from, and
//! serves them to the policy core:
//!
//! - `Ingress` resources of every supported `networking.k8s.io` version are
//!   converted into a single, version-independent representation and listed
//!   by the services they route to.
//! - `Service` resources are reduced to the application protocol of each
//!   target port.
//!
//! The index is updated through [`kubert::index::IndexNamespacedResource`] and
//! read through a [`Reader`], which may be shared by any number of concurrent
//! lookups.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod index;
mod ingress;
mod service;

#[cfg(test)]
mod tests;

pub use self::index::{Index, IndexError, Reader, SharedIndex};
