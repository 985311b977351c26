//! Policy Resolver - hierarchical lookup over a snapshot
//! Core Principle: Nearest ancestor with an explicit rule wins, otherwise deny

use serde::Serialize;

use crate::path_normalizer::{CanonicalPath, PathNormalizer};

use super::policy_rule::PolicyRule;
use super::policy_store::PolicyMap;

/// Effective rule for a query path and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub query: CanonicalPath,
    pub rule: PolicyRule,
    /// Path of the rule that applied, `None` when the default deny applied
    pub matched: Option<CanonicalPath>,
}

impl Resolution {
    pub fn is_exact(&self) -> bool {
        self.matched.as_ref() == Some(&self.query)
    }

    pub fn is_default(&self) -> bool {
        self.matched.is_none()
    }
}

/// Resolves effective rules. Must use the same normalizer as the store the
/// snapshot came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyResolver {
    normalizer: PathNormalizer,
}

impl PolicyResolver {
    pub fn new(normalizer: PathNormalizer) -> Self {
        PolicyResolver { normalizer }
    }

    /// Effective rule for `raw_query` under `rules`
    pub fn resolve(&self, rules: &PolicyMap, raw_query: &str) -> PolicyRule {
        self.resolve_detailed(rules, raw_query).rule
    }

    pub fn resolve_detailed(&self, rules: &PolicyMap, raw_query: &str) -> Resolution {
        let query = self.normalizer.normalize(raw_query);
        let found = resolve_canonical(rules, &query);

        match found {
            Some((matched, rule)) => Resolution {
                query,
                rule,
                matched: Some(matched),
            },
            None => Resolution {
                query,
                rule: PolicyRule::deny_all(),
                matched: None,
            },
        }
    }
}

/// Walk `path` and its ancestors, most specific first, until a rule is found.
///
/// Paths are unique keys, so each depth has at most one candidate and the
/// first hit is the longest match.
pub fn resolve_canonical(rules: &PolicyMap, path: &CanonicalPath) -> Option<(CanonicalPath, PolicyRule)> {
    path.ancestors()
        .find_map(|ancestor| rules.get(&ancestor).map(|rule| (ancestor, *rule)))
}
