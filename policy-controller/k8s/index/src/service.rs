use ingress_policy_core::{AppProtocol, PortProtocols};
use ingress_policy_k8s_api::{IntOrString, ServicePort, ServiceSpec};
use std::num::NonZeroU16;

/// Port name prefixes that indicate a port's protocol when `appProtocol` is
/// not set. More specific prefixes must precede the prefixes they extend.
const PORT_NAME_PROTOCOLS: [(&str, AppProtocol); 5] = [
    ("tcp-server-first", AppProtocol::TcpServerFirst),
    ("https", AppProtocol::Https),
    ("http", AppProtocol::Http),
    ("tcp", AppProtocol::Tcp),
    ("grpc", AppProtocol::Grpc),
];

/// Returns the application protocol of each of the service's target ports.
pub(crate) fn port_protocols(spec: &ServiceSpec) -> PortProtocols {
    let mut ports = PortProtocols::new();
    for port in spec.ports.iter().flatten() {
        if !port
            .protocol
            .as_deref()
            .map_or(true, |p| p.eq_ignore_ascii_case("TCP"))
        {
            tracing::debug!(port = port.port, protocol = ?port.protocol, "Skipping non-TCP port");
            continue;
        }

        let Some(target) = target_port(port) else {
            tracing::info!(port = port.port, "Ignoring invalid service port");
            continue;
        };

        let protocol = app_protocol(port);
        if let Some(replaced) = ports.insert(target, protocol.clone()) {
            tracing::debug!(
                port = port.port,
                target = %target,
                %replaced,
                %protocol,
                "Service ports share a target port; keeping the last"
            );
        }
    }
    ports
}

/// Named target ports refer to container ports that are only known to
/// endpoints, so they are keyed by the service port instead.
fn target_port(port: &ServicePort) -> Option<NonZeroU16> {
    let p = match port.target_port {
        Some(IntOrString::Int(p)) => p,
        Some(IntOrString::String(_)) | None => port.port,
    };
    u16::try_from(p).ok().and_then(NonZeroU16::new)
}

fn app_protocol(port: &ServicePort) -> AppProtocol {
    if let Some(p) = port.app_protocol.as_deref() {
        return AppProtocol::from(p);
    }

    let name = port.name.as_deref().unwrap_or_default().to_ascii_lowercase();
    PORT_NAME_PROTOCOLS
        .iter()
        .find(|(prefix, _)| {
            name.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
        })
        .map(|(_, protocol)| protocol.clone())
        .unwrap_or(AppProtocol::Http)
}
