use crate::route::Rule;
use serde::Serialize;
use std::collections::BTreeSet;

/// Matches requests for any host.
pub const WILDCARD_HOST: &str = "*";

/// Routing rules applied to inbound requests for a set of hostnames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InboundTrafficPolicy {
    pub name: String,
    pub hostnames: Vec<String>,
    pub rules: Vec<Rule>,
}

/// Determines how policies whose hostnames partially overlap are combined.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Policies must either claim exactly the same hostnames or disjoint
    /// hostnames; anything else is an error.
    #[default]
    RejectPartialOverlap,

    /// Policies that do not claim exactly the same hostnames are kept as
    /// separate entries, even when their hostnames intersect.
    KeepPartialOverlap,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("policy {candidate} claims hostnames {overlap:?} that are also claimed by policy {existing} with a different hostname set")]
pub struct AmbiguousHostnameOverlap {
    pub candidate: String,
    pub existing: String,
    pub overlap: Vec<String>,
}

// === impl InboundTrafficPolicy ===

impl InboundTrafficPolicy {
    /// Creates a policy without rules. Empty hostnames are normalized to the
    /// wildcard host.
    pub fn new(name: impl ToString, hostnames: impl IntoIterator<Item = impl ToString>) -> Self {
        let hostnames = hostnames
            .into_iter()
            .map(|h| {
                let h = h.to_string();
                if h.is_empty() {
                    WILDCARD_HOST.to_string()
                } else {
                    h
                }
            })
            .collect();
        Self {
            name: name.to_string(),
            hostnames,
            rules: vec![],
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    fn host_set(&self) -> BTreeSet<&str> {
        self.hostnames.iter().map(String::as_str).collect()
    }
}

/// Merges `candidate` into `policies`.
///
/// A candidate claiming exactly the hostnames of an existing policy has its
/// rules appended to that policy, in order and without de-duplication. A
/// candidate whose hostnames are disjoint from every existing policy is added
/// as a new entry. On error, `policies` is left unchanged.
pub fn merge(
    strategy: MergeStrategy,
    policies: &mut Vec<InboundTrafficPolicy>,
    candidate: InboundTrafficPolicy,
) -> Result<(), AmbiguousHostnameOverlap> {
    let hosts = candidate.host_set();
    let mut same_hosts = None;
    for (idx, existing) in policies.iter().enumerate() {
        let existing_hosts = existing.host_set();
        if existing_hosts == hosts {
            same_hosts.get_or_insert(idx);
            continue;
        }

        if strategy == MergeStrategy::RejectPartialOverlap && !existing_hosts.is_disjoint(&hosts) {
            return Err(AmbiguousHostnameOverlap {
                candidate: candidate.name.clone(),
                existing: existing.name.clone(),
                overlap: existing_hosts
                    .intersection(&hosts)
                    .map(|h| h.to_string())
                    .collect(),
            });
        }
    }

    match same_hosts {
        Some(idx) => policies[idx].rules.extend(candidate.rules),
        None => policies.push(candidate),
    }
    Ok(())
}
