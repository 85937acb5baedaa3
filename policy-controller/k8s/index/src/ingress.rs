//! Maps each version of the Ingress API onto the common ingress shape.

use ingress_policy_core::{IngressObject, IngressPath, IngressRule, PathType};
use ingress_policy_k8s_api::{networking_v1 as v1, networking_v1beta1 as v1beta1, ResourceExt};

/// Converts a `networking.k8s.io/v1` ingress. Returns `None` if the resource
/// is not namespaced.
pub(crate) fn from_v1(ingress: v1::Ingress) -> Option<IngressObject> {
    let namespace = ingress.namespace()?;
    let name = ingress.name_unchecked();
    let spec = ingress.spec.unwrap_or_default();

    let default_backend = spec
        .default_backend
        .and_then(|backend| backend.service)
        .map(|svc| svc.name);

    let rules = spec
        .rules
        .into_iter()
        .flatten()
        .map(|rule| IngressRule {
            host: rule.host,
            paths: rule
                .http
                .into_iter()
                .flat_map(|http| http.paths)
                .map(|path| IngressPath {
                    path: path.path.unwrap_or_default(),
                    // The API server defaults the path type, so an empty value
                    // only appears in resources that were never admitted.
                    path_type: Some(path.path_type)
                        .filter(|t| !t.is_empty())
                        .map(|t| PathType::from(t.as_str())),
                    backend: path.backend.service.map(|svc| svc.name),
                })
                .collect(),
        })
        .collect();

    Some(IngressObject {
        name,
        namespace,
        default_backend,
        rules,
    })
}

/// Converts a `networking.k8s.io/v1beta1` ingress. Returns `None` if the
/// resource is not namespaced.
pub(crate) fn from_v1beta1(ingress: v1beta1::Ingress) -> Option<IngressObject> {
    let namespace = ingress.namespace()?;
    let name = ingress.name_unchecked();
    let spec = ingress.spec;

    let default_backend = spec.backend.and_then(|backend| backend.service_name);

    let rules = spec
        .rules
        .into_iter()
        .flatten()
        .map(|rule| IngressRule {
            host: rule.host,
            paths: rule
                .http
                .into_iter()
                .flat_map(|http| http.paths)
                .map(|path| IngressPath {
                    path: path.path.unwrap_or_default(),
                    path_type: path.path_type.as_deref().map(PathType::from),
                    backend: path.backend.service_name,
                })
                .collect(),
        })
        .collect();

    Some(IngressObject {
        name,
        namespace,
        default_backend,
        rules,
    })
}
