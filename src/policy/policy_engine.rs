//! Policy Engine
//! Core Principle: Store first, then push the full snapshot. The registry is the
//! source of truth whether or not the agent could be reached.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::path_normalizer::CanonicalPath;
use crate::sync::{PushOutcome, PushTrigger, Propagator};

use super::policy_resolver::{PolicyResolver, Resolution};
use super::policy_rule::PolicyRule;
use super::policy_store::{PolicySnapshot, PolicyStore};

/// Result of an admin change: storage and propagation reported separately
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<CanonicalPath>,
    /// The change is recorded in the registry
    pub stored: bool,
    /// The change altered the agent's rule set
    pub changed: bool,
    pub generation: u64,
    /// Outcome of the immediate push; `None` when nothing needed pushing
    pub propagation: Option<PushOutcome>,
}

impl UpdateReport {
    pub fn propagated(&self) -> bool {
        matches!(self.propagation, None | Some(PushOutcome::Success))
    }

    /// Propagation failure as an error, for callers that want `?`
    pub fn propagation_result(&self) -> Result<()> {
        match &self.propagation {
            Some(outcome) => outcome.clone().into_result(&self.agent_id),
            None => Ok(()),
        }
    }
}

/// Main policy engine
pub struct PolicyEngine {
    store: Arc<PolicyStore>,
    resolver: PolicyResolver,
    propagator: Arc<Propagator>,
}

impl PolicyEngine {
    /// Create new policy engine
    pub fn new(store: Arc<PolicyStore>, propagator: Arc<Propagator>) -> Arc<Self> {
        let resolver = PolicyResolver::new(*store.normalizer());
        Arc::new(PolicyEngine {
            store,
            resolver,
            propagator,
        })
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn register_agent(&self, agent_id: &str, agent_url: &str) -> Result<()> {
        self.store.register_agent(agent_id, agent_url)
    }

    /// Set a rule and push the agent's full rule set
    pub async fn set_rule(&self, agent_id: &str, raw_path: &str, rule: PolicyRule) -> Result<UpdateReport> {
        let path = self.store.set_rule(agent_id, raw_path, rule)?;
        let propagation = self.push(agent_id).await?;
        Ok(self.report(agent_id, Some(path), true, Some(propagation)))
    }

    /// Remove a rule and, if one was removed, push the agent's full rule set
    pub async fn clear_rule(&self, agent_id: &str, raw_path: &str) -> Result<UpdateReport> {
        let removed = self.store.clear_rule(agent_id, raw_path)?;
        let path = self.store.normalizer().normalize(raw_path);

        let propagation = if removed {
            Some(self.push(agent_id).await?)
        } else {
            None
        };
        Ok(self.report(agent_id, Some(path), removed, propagation))
    }

    /// Revoke every rule of an agent and push the empty set.
    ///
    /// An agent without a URL is already forgotten by the store and nothing is pushed.
    pub async fn remove_agent(&self, agent_id: &str) -> Result<UpdateReport> {
        let removed = self.store.remove_agent(agent_id)?;
        let retiring = self.store.sync_state(agent_id).is_some();

        let propagation = if removed && retiring {
            Some(self.push(agent_id).await?)
        } else {
            None
        };
        Ok(self.report(agent_id, None, removed, propagation))
    }

    /// What would be pushed to the agent right now
    pub fn snapshot(&self, agent_id: &str) -> PolicySnapshot {
        self.store.snapshot(agent_id)
    }

    /// Effective rule for a path on an agent
    pub fn resolve(&self, agent_id: &str, raw_path: &str) -> Resolution {
        let snapshot = self.store.snapshot(agent_id);
        self.resolver.resolve_detailed(snapshot.rules(), raw_path)
    }

    async fn push(&self, agent_id: &str) -> Result<PushOutcome> {
        self.propagator.push_agent(agent_id, PushTrigger::Immediate).await
    }

    fn report(
        &self,
        agent_id: &str,
        path: Option<CanonicalPath>,
        changed: bool,
        propagation: Option<PushOutcome>,
    ) -> UpdateReport {
        let generation = self
            .store
            .sync_status(agent_id)
            .map(|status| status.generation)
            .unwrap_or(0);

        UpdateReport {
            agent_id: agent_id.to_string(),
            path,
            stored: true,
            changed,
            generation,
            propagation,
        }
    }
}
