use crate::{
    diagnostic::Diagnostic,
    path_match::{path_match, PathMatchError, PathType},
    policy::{self, AmbiguousHostnameOverlap, InboundTrafficPolicy, MergeStrategy, WILDCARD_HOST},
    route::{RouteMatch, Rule},
    MeshService,
};
use anyhow::{anyhow, Error, Result};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// The supported versions of the `networking.k8s.io` Ingress API.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiVersion {
    V1,
    V1beta1,
}

/// Lists the ingress objects of one API version that reference a service.
pub trait IngressProvider {
    fn list_ingresses(&self, version: ApiVersion, svc: &MeshService) -> Result<Vec<IngressObject>>;
}

/// An ingress resource, independent of the API version it was read from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngressObject {
    pub name: String,
    pub namespace: String,

    /// The name of the service that receives requests matching no rule.
    pub default_backend: Option<String>,
    pub rules: Vec<IngressRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngressRule {
    pub host: Option<String>,
    pub paths: Vec<IngressPath>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressPath {
    pub path: String,
    pub path_type: Option<PathType>,

    /// The name of the backend service, if the backend is a service.
    pub backend: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to list {version} ingresses for service {service}")]
    Fetch {
        version: ApiVersion,
        service: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error(transparent)]
    Overlap(#[from] AmbiguousHostnameOverlap),
}

// === impl ApiVersion ===

impl ApiVersion {
    pub const ALL: [Self; 2] = [Self::V1, Self::V1beta1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "networking.k8s.io/v1",
            Self::V1beta1 => "networking.k8s.io/v1beta1",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches("networking.k8s.io/") {
            "v1" => Ok(Self::V1),
            "v1beta1" => Ok(Self::V1beta1),
            _ => Err(anyhow!("unsupported ingress API version: {s:?}")),
        }
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// === impl IngressObject ===

impl IngressObject {
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    /// Indicates whether the default backend or any path routes to the
    /// service.
    pub fn references(&self, svc: &MeshService) -> bool {
        if self.namespace != svc.namespace {
            return false;
        }
        self.default_backend.as_deref() == Some(svc.name.as_str())
            || self
                .rules
                .iter()
                .flat_map(|rule| rule.paths.iter())
                .any(|path| path.backend.as_deref() == Some(svc.name.as_str()))
    }
}

// === impl ResourceRef ===

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Returns the name of the policy generated for a host of an ingress object.
pub fn policy_name(name: &str, namespace: &str, host: &str) -> String {
    format!("{name}.{namespace}|{host}")
}

/// Lists a version's ingress objects for the service and builds their
/// policies.
pub fn extract(
    provider: &impl IngressProvider,
    version: ApiVersion,
    svc: &MeshService,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<InboundTrafficPolicy>, ExtractError> {
    let ingresses = provider
        .list_ingresses(version, svc)
        .map_err(|error| ExtractError::Fetch {
            version,
            service: svc.to_string(),
            source: error.into(),
        })?;
    if ingresses.is_empty() {
        tracing::trace!(%svc, %version, "No ingress resources found");
        return Ok(vec![]);
    }

    let policies = inbound_policies(svc, &ingresses, diagnostics)?;
    Ok(policies)
}

/// Builds the inbound policies that route ingress traffic to the service.
///
/// Paths that cannot be translated are skipped and reported in
/// `diagnostics`; the remainder of the ingress object is still processed.
pub fn inbound_policies(
    svc: &MeshService,
    ingresses: &[IngressObject],
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<InboundTrafficPolicy>, AmbiguousHostnameOverlap> {
    let cluster = svc.default_weighted_cluster();
    let mut policies = Vec::new();

    for ingress in ingresses {
        if ingress.default_backend.as_deref() == Some(svc.name.as_str()) {
            let mut wildcard = InboundTrafficPolicy::new(
                policy_name(&ingress.name, &ingress.namespace, WILDCARD_HOST),
                [WILDCARD_HOST],
            );
            wildcard.add_rule(Rule::unauthenticated(
                RouteMatch::wildcard(),
                cluster.clone(),
            ));
            policy::merge(MergeStrategy::RejectPartialOverlap, &mut policies, wildcard)?;
        }

        for rule in &ingress.rules {
            let host = rule
                .host
                .as_deref()
                .filter(|h| !h.is_empty())
                .unwrap_or(WILDCARD_HOST);
            let mut policy =
                InboundTrafficPolicy::new(policy_name(&ingress.name, &ingress.namespace, host), [host]);

            for ingress_path in &rule.paths {
                if ingress_path.backend.as_deref() != Some(svc.name.as_str()) {
                    continue;
                }

                match path_match(&ingress_path.path, ingress_path.path_type.as_ref()) {
                    Ok(path) => policy.add_rule(Rule::unauthenticated(
                        RouteMatch::any_method(path),
                        cluster.clone(),
                    )),
                    Err(error) => {
                        let diagnostic = Diagnostic::skipped_path(ingress, ingress_path, error);
                        tracing::info!(
                            ingress = %ingress.resource_ref(),
                            path = %ingress_path.path,
                            %diagnostic,
                            "Ignoring ingress path"
                        );
                        diagnostics.push(diagnostic);
                    }
                }
            }

            if !policy.rules.is_empty() {
                policy::merge(MergeStrategy::RejectPartialOverlap, &mut policies, policy)?;
            }
        }
    }

    Ok(policies)
}

impl Diagnostic {
    fn skipped_path(ingress: &IngressObject, path: &IngressPath, error: PathMatchError) -> Self {
        match error {
            PathMatchError::UnsupportedPathType(path_type) => Self::UnsupportedPathType {
                ingress: ingress.resource_ref(),
                path: path.path.clone(),
                path_type,
            },
            PathMatchError::InvalidRegex { path, source } => Self::InvalidPathRegex {
                ingress: ingress.resource_ref(),
                path,
                error: source.to_string(),
            },
        }
    }
}
