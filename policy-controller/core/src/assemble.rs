use crate::{
    diagnostic::Diagnostic,
    ingress::{self, ApiVersion, ExtractError, IngressProvider},
    policy::{self, InboundTrafficPolicy, MergeStrategy},
    traffic_match::{traffic_matches, IngressTrafficMatch},
    MeshService, PortProtocolResolver,
};
use anyhow::{Context, Result};
use serde::Serialize;

/// A snapshot of the mesh configuration that affects ingress policy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Ingress traffic reaches the service over TLS.
    pub https_ingress: bool,

    /// Ingress backends are configured with the IngressBackend API rather
    /// than with Kubernetes ingress resources.
    pub ingress_backend_policy: bool,
}

/// Configures the listeners and routes for a service's ingress traffic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IngressTrafficPolicy {
    pub traffic_matches: Vec<IngressTrafficMatch>,
    pub http_route_policies: Vec<InboundTrafficPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngressPolicyOutcome {
    /// The service's ingress policy, if ingress needs to be configured at all.
    pub policy: Option<IngressTrafficPolicy>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the ingress traffic policy for a service.
///
/// Every supported ingress API version is consulted. A version whose
/// resources cannot be listed is reported as a diagnostic and contributes no
/// policies. Failing to resolve the service's ports, or ingress objects making
/// conflicting claims on a hostname, fails the whole call.
pub fn ingress_traffic_policy(
    svc: &MeshService,
    config: PolicyConfig,
    ingresses: &impl IngressProvider,
    ports: &impl PortProtocolResolver,
) -> Result<IngressPolicyOutcome> {
    if config.ingress_backend_policy {
        // TODO: build policies from IngressBackend resources once that API is
        // indexed.
        tracing::debug!(%svc, "IngressBackend policy is enabled; skipping Kubernetes ingress");
        return Ok(IngressPolicyOutcome::default());
    }

    let mut diagnostics = Vec::new();
    let mut route_policies = Vec::new();
    let mut available = 0;
    for version in ApiVersion::ALL {
        let policies = match ingress::extract(ingresses, version, svc, &mut diagnostics) {
            Ok(policies) => policies,
            Err(ExtractError::Fetch { source, .. }) => {
                tracing::warn!(%svc, %version, error = %source, "Failed to list ingress resources");
                diagnostics.push(Diagnostic::ProviderUnavailable {
                    version,
                    error: source.to_string(),
                });
                continue;
            }
            Err(ExtractError::Overlap(error)) => {
                return Err(error).with_context(|| {
                    format!("failed to build {version} ingress policies for service {svc}")
                });
            }
        };
        available += 1;

        for policy in policies {
            policy::merge(MergeStrategy::RejectPartialOverlap, &mut route_policies, policy)
                .with_context(|| format!("failed to merge ingress policies for service {svc}"))?;
        }
    }

    if available == 0 {
        tracing::warn!(%svc, "No ingress API version is available");
        diagnostics.push(Diagnostic::NoProviderAvailable);
    }

    if route_policies.is_empty() {
        tracing::trace!(%svc, "No ingress routes");
        return Ok(IngressPolicyOutcome {
            policy: None,
            diagnostics,
        });
    }

    let port_protocols = ports
        .target_port_protocols(svc)
        .with_context(|| format!("failed to resolve port protocols for service {svc}"))?;

    Ok(IngressPolicyOutcome {
        policy: Some(IngressTrafficPolicy {
            traffic_matches: traffic_matches(svc, &port_protocols, config.https_ingress),
            http_route_policies: route_policies,
        }),
        diagnostics,
    })
}
