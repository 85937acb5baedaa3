//! Translates Kubernetes ingress paths into route path matches.
//!
//! Ingress supports three path types:
//!
//! - `Exact` matches the URL path exactly.
//! - `Prefix` matches on URL path elements split by `/`, so that `/foo`
//!   matches `/foo` and `/foo/bar` but not `/foobar`, and `/foo/` is equivalent
//!   to `/foo`. Proxies only offer raw string prefixes, so element-wise
//!   prefixes are expressed as an anchored regular expression.
//! - `ImplementationSpecific` leaves matching to the implementation. Paths that
//!   look like regular expressions are matched as such; all others are matched
//!   as raw string prefixes.

use crate::route::PathMatch;
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Matches zero or more trailing path elements, anchored to the end of the
/// path.
pub const PREFIX_PATH_ELEMENTS_REGEX: &str = "(/.*)?$";

/// Characters that are commonly only used in regular expressions. An
/// implementation-specific path containing any of them is matched as a regex.
pub const COMMON_REGEX_CHARS: &[char] = &['^', '$', '*', '+', '[', ']', '%', '|'];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathType {
    Exact,
    Prefix,
    ImplementationSpecific,
    Unknown(String),
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum PathMatchError {
    #[error("unsupported path type {0:?}")]
    UnsupportedPathType(String),

    #[error("path {path:?} is not a valid regular expression: {source}")]
    InvalidRegex {
        path: String,
        #[source]
        source: regex::Error,
    },
}

/// Returns the path match for an ingress path. Ingress paths without a path
/// type are matched as `ImplementationSpecific`.
pub fn path_match(path: &str, path_type: Option<&PathType>) -> Result<PathMatch, PathMatchError> {
    match path_type.unwrap_or(&PathType::ImplementationSpecific) {
        PathType::Exact => Ok(PathMatch::Exact(path.to_string())),

        // The root path matches every request, so a string prefix suffices.
        PathType::Prefix if path == "/" => Ok(PathMatch::Prefix(path.to_string())),

        PathType::Prefix => regex(format!(
            "{}{PREFIX_PATH_ELEMENTS_REGEX}",
            path.trim_end_matches('/')
        )),

        PathType::ImplementationSpecific if path.contains(COMMON_REGEX_CHARS) => {
            regex(path.to_string())
        }

        PathType::ImplementationSpecific => Ok(PathMatch::Prefix(path.to_string())),

        PathType::Unknown(t) => Err(PathMatchError::UnsupportedPathType(t.clone())),
    }
}

fn regex(path: String) -> Result<PathMatch, PathMatchError> {
    match PathMatch::regex(&path) {
        Ok(m) => Ok(m),
        Err(source) => Err(PathMatchError::InvalidRegex { path, source }),
    }
}

// === impl PathType ===

impl PathType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact => "Exact",
            Self::Prefix => "Prefix",
            Self::ImplementationSpecific => "ImplementationSpecific",
            Self::Unknown(t) => t,
        }
    }
}

impl From<&str> for PathType {
    fn from(s: &str) -> Self {
        match s {
            "Exact" => Self::Exact,
            "Prefix" => Self::Prefix,
            "ImplementationSpecific" => Self::ImplementationSpecific,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl FromStr for PathType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl Serialize for PathType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
