use crate::{AppProtocol, MeshService, PortProtocols};
use serde::Serialize;
use std::num::NonZeroU16;

/// Matches ingress connections on a service port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IngressTrafficMatch {
    pub name: String,
    pub port: NonZeroU16,
    pub protocol: AppProtocol,
    pub skip_client_cert_validation: bool,

    /// TLS server names to match. When empty, only connections that do not
    /// present a server name match.
    pub server_names: Vec<String>,
}

/// Builds the traffic matches for each of a service's HTTP ports.
///
/// When HTTPS ingress is enabled, each port gets two matches: one for clients
/// that omit SNI and one for clients that present the service's server name.
/// Ingress clients are not mesh-authenticated, so client certificates are
/// never validated. Non-HTTP ports cannot be addressed through ingress and
/// are skipped.
pub fn traffic_matches(
    svc: &MeshService,
    ports: &PortProtocols,
    https_ingress: bool,
) -> Vec<IngressTrafficMatch> {
    let mut matches = Vec::new();
    for (&port, protocol) in ports {
        if *protocol != AppProtocol::Http {
            tracing::trace!(%svc, %port, %protocol, "Skipping non-HTTP port");
            continue;
        }

        if https_ingress {
            let https = IngressTrafficMatch {
                name: format!("ingress_{svc}_{port}_{}", AppProtocol::Https),
                port,
                protocol: AppProtocol::Https,
                skip_client_cert_validation: true,
                server_names: vec![],
            };
            let with_sni = IngressTrafficMatch {
                name: format!("{}_with_sni", https.name),
                server_names: vec![svc.server_name.clone()],
                ..https.clone()
            };
            matches.push(https);
            matches.push(with_sni);
        } else {
            matches.push(IngressTrafficMatch {
                name: format!("ingress_{svc}_{port}_{}", AppProtocol::Http),
                port,
                protocol: AppProtocol::Http,
                skip_client_cert_validation: false,
                server_names: vec![],
            });
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn port(p: u16) -> NonZeroU16 {
        NonZeroU16::new(p).unwrap()
    }

    fn svc() -> MeshService {
        MeshService::new("web", "emojivoto", "cluster.local")
    }

    #[test]
    fn http() {
        let matches = traffic_matches(&svc(), &btreemap! { port(80) => AppProtocol::Http }, false);
        assert_eq!(
            matches,
            vec![IngressTrafficMatch {
                name: "ingress_emojivoto/web_80_http".to_string(),
                port: port(80),
                protocol: AppProtocol::Http,
                skip_client_cert_validation: false,
                server_names: vec![],
            }]
        );
    }

    #[test]
    fn https_with_and_without_sni() {
        let matches = traffic_matches(&svc(), &btreemap! { port(80) => AppProtocol::Http }, true);
        assert_eq!(
            matches,
            vec![
                IngressTrafficMatch {
                    name: "ingress_emojivoto/web_80_https".to_string(),
                    port: port(80),
                    protocol: AppProtocol::Https,
                    skip_client_cert_validation: true,
                    server_names: vec![],
                },
                IngressTrafficMatch {
                    name: "ingress_emojivoto/web_80_https_with_sni".to_string(),
                    port: port(80),
                    protocol: AppProtocol::Https,
                    skip_client_cert_validation: true,
                    server_names: vec!["web.emojivoto.svc.cluster.local".to_string()],
                },
            ]
        );
    }

    #[test]
    fn skips_non_http_ports() {
        let ports = btreemap! {
            port(9090) => AppProtocol::Http,
            port(5432) => AppProtocol::Tcp,
            port(8443) => AppProtocol::Https,
            port(8080) => AppProtocol::Http,
            port(9000) => AppProtocol::Grpc,
        };
        let names = traffic_matches(&svc(), &ports, false)
            .into_iter()
            .map(|m| m.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "ingress_emojivoto/web_8080_http".to_string(),
                "ingress_emojivoto/web_9090_http".to_string(),
            ]
        );
    }

    #[test]
    fn no_ports() {
        assert!(traffic_matches(&svc(), &PortProtocols::new(), true).is_empty());
    }
}
