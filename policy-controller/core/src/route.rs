use crate::{IdentityMatch, WeightedCluster};
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Matches any HTTP method.
pub const WILDCARD_HTTP_METHOD: &str = "*";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "lowercase")]
pub enum PathMatch {
    Exact(String),
    Prefix(String),
    Regex(PathRegex),
}

/// A path regular expression as authored, along with a matcher that applies
/// it to the whole request path.
#[derive(Clone)]
pub struct PathRegex {
    pattern: String,
    full: Regex,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub path: PathMatch,
    pub methods: Vec<String>,
}

/// A route and the clusters that receive its traffic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub route: RouteMatch,
    pub clusters: Vec<WeightedCluster>,
    pub allowed_identities: Vec<IdentityMatch>,
}

// === impl PathMatch ===

impl PathMatch {
    pub fn regex(s: &str) -> Result<Self, regex::Error> {
        s.parse().map(Self::Regex)
    }

    pub fn pattern(&self) -> &str {
        match self {
            Self::Exact(p) | Self::Prefix(p) => p,
            Self::Regex(r) => r.as_str(),
        }
    }

    /// Indicates whether a request path is selected by this match.
    ///
    /// Prefixes are raw string prefixes and expressions must match the entire
    /// path.
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => p == path,
            Self::Prefix(p) => path.starts_with(p.as_str()),
            Self::Regex(r) => r.is_match(path),
        }
    }
}

// === impl PathRegex ===

impl PathRegex {
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.full.is_match(path)
    }
}

impl std::str::FromStr for PathRegex {
    type Err = regex::Error;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        // Validate the pattern on its own so that errors point at what was
        // authored rather than at the anchoring group.
        Regex::new(pattern)?;
        let full = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            pattern: pattern.to_string(),
            full,
        })
    }
}

impl PartialEq for PathRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PathRegex {}

impl fmt::Debug for PathRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathRegex").field(&self.pattern).finish()
    }
}

impl fmt::Display for PathRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pattern.fmt(f)
    }
}

impl Serialize for PathRegex {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

// === impl RouteMatch ===

impl RouteMatch {
    /// Matches requests with any method on the given path.
    pub fn any_method(path: PathMatch) -> Self {
        Self {
            path,
            methods: vec![WILDCARD_HTTP_METHOD.to_string()],
        }
    }

    /// Matches every request.
    pub fn wildcard() -> Self {
        Self::any_method(PathMatch::Prefix("/".to_string()))
    }
}

// === impl Rule ===

impl Rule {
    /// A rule that sends all matching traffic to a single cluster on behalf of
    /// any caller.
    pub fn unauthenticated(route: RouteMatch, cluster: WeightedCluster) -> Self {
        Self {
            route,
            clusters: vec![cluster],
            allowed_identities: vec![IdentityMatch::any()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_equality_uses_pattern() {
        assert_eq!(
            PathMatch::regex("/foo(/.*)?$").unwrap(),
            PathMatch::regex("/foo(/.*)?$").unwrap()
        );
        assert_ne!(
            PathMatch::regex("/foo").unwrap(),
            PathMatch::Prefix("/foo".to_string())
        );
    }

    #[test]
    fn regex_matches_whole_path() {
        let m = PathMatch::regex("/foo").unwrap();
        assert!(m.is_match("/foo"));
        assert!(!m.is_match("/foo/bar"));
        assert!(!m.is_match("/bar/foo"));
        assert_eq!(m.pattern(), "/foo");
    }

    #[test]
    fn invalid_regex() {
        assert!(PathMatch::regex("/foo[").is_err());
        // A pattern that only parses once wrapped must still be rejected.
        assert!(PathMatch::regex("a)(b").is_err());
    }

    #[test]
    fn wildcard_route() {
        let route = RouteMatch::wildcard();
        assert_eq!(route.path, PathMatch::Prefix("/".to_string()));
        assert_eq!(route.methods, vec!["*".to_string()]);
        assert!(route.path.is_match("/anything/at/all"));
    }
}
