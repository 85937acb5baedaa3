use crate::ingress::{ApiVersion, ResourceRef};
use serde::Serialize;
use std::fmt;

/// A condition that was tolerated while building a policy.
///
/// Diagnostics never change the routes that are produced for valid input;
/// they explain what was left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Diagnostic {
    /// Ingress resources of this version could not be listed; the version
    /// contributed no policies.
    ProviderUnavailable { version: ApiVersion, error: String },

    /// No ingress API version could be listed at all, so an empty result does
    /// not mean that the service has no ingress configured.
    NoProviderAvailable,

    /// An ingress path declared a path type outside of the supported set.
    UnsupportedPathType {
        ingress: ResourceRef,
        path: String,
        path_type: String,
    },

    /// An implementation-specific ingress path looked like, but was not, a
    /// valid regular expression.
    InvalidPathRegex {
        ingress: ResourceRef,
        path: String,
        error: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { version, error } => {
                write!(f, "{version} ingresses are unavailable: {error}")
            }
            Self::NoProviderAvailable => "no ingress API version is available".fmt(f),
            Self::UnsupportedPathType {
                ingress,
                path,
                path_type,
            } => write!(
                f,
                "ingress {ingress} path {path:?} has unsupported path type {path_type:?}"
            ),
            Self::InvalidPathRegex {
                ingress,
                path,
                error,
            } => write!(
                f,
                "ingress {ingress} path {path:?} is not a valid regular expression: {error}"
            ),
        }
    }
}
