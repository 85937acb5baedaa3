//! Ingress policy translation.
//!
//! Converts Kubernetes `Ingress` resources that route to a meshed service into
//! the inbound traffic policy consumed by the service's proxy configuration:
//!
//! - each ingress path is translated into a route match, honoring the
//!   semantics of the ingress path types;
//! - the routes of all ingress objects, across API versions, are merged into
//!   one policy per set of hostnames;
//! - each HTTP port of the service is given listener-level traffic matches,
//!   which are TLS-aware when HTTPS ingress is enabled.
//!
//! The translation is a pure function of the ingress objects, the service's
//! port protocols, and a configuration snapshot, all of which are supplied by
//! the caller.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod assemble;
mod diagnostic;
mod identity_match;
pub mod ingress;
pub mod path_match;
pub mod policy;
pub mod route;
mod service;
pub mod traffic_match;


pub use self::{
    assemble::{ingress_traffic_policy, IngressPolicyOutcome, IngressTrafficPolicy, PolicyConfig},
    diagnostic::Diagnostic,
    identity_match::IdentityMatch,
    ingress::{ApiVersion, IngressObject, IngressPath, IngressProvider, IngressRule, ResourceRef},
    path_match::PathType,
    policy::InboundTrafficPolicy,
    route::{PathMatch, RouteMatch, Rule},
    service::{AppProtocol, MeshService, PortProtocolResolver, PortProtocols, WeightedCluster},
    traffic_match::IngressTrafficMatch,
};
