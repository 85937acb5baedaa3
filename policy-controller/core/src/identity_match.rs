use serde::Serialize;
use std::fmt;

/// Matches a client's mesh identity.
///
/// Ingress traffic is not authenticated by the mesh, so ingress-derived rules
/// only ever match any client, including clients without an identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdentityMatch {
    Any,
}

// === impl IdentityMatch ===

impl IdentityMatch {
    pub const fn any() -> Self {
        Self::Any
    }
}

impl fmt::Display for IdentityMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => "*".fmt(f),
        }
    }
}

impl Serialize for IdentityMatch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
