use anyhow::{anyhow, Error, Result};
use serde::Serialize;
use std::{collections::BTreeMap, fmt, num::NonZeroU16, str::FromStr};

/// The weight given to a cluster that receives all of a route's traffic.
pub const CLUSTER_WEIGHT_ACCEPT_ALL: u32 = 100;

/// The DNS domain used when a service is parsed without an explicit domain.
pub const DEFAULT_DNS_DOMAIN: &str = "cluster.local";

/// Identifies a meshed service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshService {
    pub name: String,
    pub namespace: String,

    /// The TLS server name that clients present when addressing the service.
    pub server_name: String,
}

/// Application protocols that a service port may be resolved to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AppProtocol {
    Http,
    Https,
    Tcp,
    TcpServerFirst,
    Grpc,
    Other(String),
}

/// Maps a service's target ports to their application protocols.
///
/// Ordered by port so that anything derived from it is stable across calls.
pub type PortProtocols = BTreeMap<NonZeroU16, AppProtocol>;

/// Resolves the application protocol of each of a service's target ports.
pub trait PortProtocolResolver {
    fn target_port_protocols(&self, svc: &MeshService) -> Result<PortProtocols>;
}

/// A backend cluster reference with a relative traffic weight.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct WeightedCluster {
    pub name: String,
    pub weight: u32,
}

// === impl MeshService ===

impl MeshService {
    pub fn new(name: impl ToString, namespace: impl ToString, dns_domain: &str) -> Self {
        let name = name.to_string();
        let namespace = namespace.to_string();
        let server_name = format!("{name}.{namespace}.svc.{dns_domain}");
        Self {
            name,
            namespace,
            server_name,
        }
    }

    /// The cluster that receives all ingress traffic for this service.
    pub fn default_weighted_cluster(&self) -> WeightedCluster {
        WeightedCluster {
            name: self.to_string(),
            weight: CLUSTER_WEIGHT_ACCEPT_ALL,
        }
    }
}

impl fmt::Display for MeshService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for MeshService {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(name, ns, DEFAULT_DNS_DOMAIN))
            }
            _ => Err(anyhow!(
                "invalid service {s:?}; expected <namespace>/<name>"
            )),
        }
    }
}

// === impl AppProtocol ===

impl AppProtocol {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
            Self::TcpServerFirst => "tcp-server-first",
            Self::Grpc => "grpc",
            Self::Other(p) => p,
        }
    }
}

impl From<&str> for AppProtocol {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "http" => Self::Http,
            "https" => Self::Https,
            "tcp" => Self::Tcp,
            "tcp-server-first" => Self::TcpServerFirst,
            "grpc" => Self::Grpc,
            other => Self::Other(other.to_string()),
        }
    }
}

impl FromStr for AppProtocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for AppProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl Serialize for AppProtocol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mesh_service() {
        let svc = "ns-0/svc-0".parse::<MeshService>().unwrap();
        assert_eq!(svc.name, "svc-0");
        assert_eq!(svc.namespace, "ns-0");
        assert_eq!(svc.server_name, "svc-0.ns-0.svc.cluster.local");
        assert_eq!(svc.to_string(), "ns-0/svc-0");

        assert!("svc-0".parse::<MeshService>().is_err(), "missing namespace");
        assert!("/svc-0".parse::<MeshService>().is_err(), "empty namespace");
        assert!("ns-0/".parse::<MeshService>().is_err(), "empty name");
        assert!("a/b/c".parse::<MeshService>().is_err(), "too many parts");
    }

    #[test]
    fn default_weighted_cluster() {
        let svc = MeshService::new("web", "emojivoto", "example.org");
        assert_eq!(svc.server_name, "web.emojivoto.svc.example.org");
        assert_eq!(
            svc.default_weighted_cluster(),
            WeightedCluster {
                name: "emojivoto/web".to_string(),
                weight: 100,
            }
        );
    }

    #[test]
    fn parse_app_protocol() {
        assert_eq!("HTTP".parse::<AppProtocol>(), Ok(AppProtocol::Http));
        assert_eq!("tcp-server-first".parse::<AppProtocol>(), Ok(AppProtocol::TcpServerFirst));
        assert_eq!(
            "kafka".parse::<AppProtocol>(),
            Ok(AppProtocol::Other("kafka".to_string()))
        );
        assert_eq!(AppProtocol::Grpc.to_string(), "grpc");
    }
}
