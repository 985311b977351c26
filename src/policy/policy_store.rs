//! Policy Store
//! Core Principle: One authoritative (agent, path) -> rule table, mutated only here

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{RegistryError, Result};
use crate::path_normalizer::{CanonicalPath, PathNormalizer};

use super::policy_rule::PolicyRule;

/// Full rule set of one agent, keyed by canonical path
pub type PolicyMap = BTreeMap<CanonicalPath, PolicyRule>;

/// Has the agent acknowledged the latest local mutation?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Pending,
    Synced,
}

/// Outcome class of a push, as remembered by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushStatus {
    Success,
    AgentUnreachable,
    AgentRejected,
}

/// Last push attempt recorded for an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LastPush {
    pub generation: u64,
    pub status: PushStatus,
    /// Unix time of the outcome, in milliseconds
    pub at_ms: u64,
}

/// Immutable point-in-time copy of one agent's rules
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    agent_id: String,
    generation: u64,
    rules: Arc<PolicyMap>,
}

impl PolicySnapshot {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Store generation this snapshot was taken at
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rules(&self) -> &PolicyMap {
        &self.rules
    }

    pub fn get(&self, path: &CanonicalPath) -> Option<&PolicyRule> {
        self.rules.get(path)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Sync bookkeeping exposed to the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct AgentSyncStatus {
    pub agent_id: String,
    pub agent_url: Option<String>,
    pub state: SyncState,
    pub generation: u64,
    pub synced_generation: Option<u64>,
    pub rule_count: usize,
    pub last_push: Option<LastPush>,
    pub retiring: bool,
}

#[derive(Debug, Default)]
struct AgentEntry {
    rules: Arc<PolicyMap>,
    agent_url: Option<String>,
    generation: u64,
    synced_generation: Option<u64>,
    last_push: Option<LastPush>,
    retiring: bool,
    // Set once the entry has been dropped from the table
    detached: bool,
}

impl AgentEntry {
    fn sync_state(&self) -> SyncState {
        if self.synced_generation == Some(self.generation) {
            SyncState::Synced
        } else {
            SyncState::Pending
        }
    }

    fn needs_reconciliation(&self) -> bool {
        match self.last_push {
            Some(LastPush { status: PushStatus::AgentUnreachable, .. }) => true,
            Some(LastPush { status: PushStatus::AgentRejected, generation, .. })
                if generation == self.generation =>
            {
                false
            }
            _ => self.sync_state() == SyncState::Pending,
        }
    }

    fn status(&self, agent_id: &str) -> AgentSyncStatus {
        AgentSyncStatus {
            agent_id: agent_id.to_string(),
            agent_url: self.agent_url.clone(),
            state: self.sync_state(),
            generation: self.generation,
            synced_generation: self.synced_generation,
            rule_count: self.rules.len(),
            last_push: self.last_push,
            retiring: self.retiring,
        }
    }
}

/// Policy store - per-agent rule tables with sync state
pub struct PolicyStore {
    normalizer: PathNormalizer,
    agents: RwLock<HashMap<String, Arc<RwLock<AgentEntry>>>>, // agent_id -> entry
}

impl PolicyStore {
    /// Create new policy store
    pub fn new(normalizer: PathNormalizer) -> Arc<Self> {
        Arc::new(PolicyStore {
            normalizer,
            agents: RwLock::new(HashMap::new()),
        })
    }

    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    /// Insert or overwrite the rule for `(agent_id, normalize(raw_path))`.
    ///
    /// Marks the agent pending. A retiring agent is revived.
    pub fn set_rule(&self, agent_id: &str, raw_path: &str, rule: PolicyRule) -> Result<CanonicalPath> {
        validate_agent_id(agent_id)?;
        validate_raw_path(raw_path)?;
        let path = self.normalizer.normalize(raw_path);

        self.mutate(agent_id, true, |entry| {
            Arc::make_mut(&mut entry.rules).insert(path.clone(), rule);
            entry.retiring = false;
            true
        })?;

        log::info!(
            "🛡️ Policy set for agent {} on {}: {}",
            agent_id,
            path,
            rule.describe()
        );
        Ok(path)
    }

    /// Remove the rule at exactly `normalize(raw_path)`.
    ///
    /// Returns whether a rule was removed; only a removal marks the agent pending.
    pub fn clear_rule(&self, agent_id: &str, raw_path: &str) -> Result<bool> {
        validate_agent_id(agent_id)?;
        validate_raw_path(raw_path)?;
        let path = self.normalizer.normalize(raw_path);

        let removed = self
            .mutate(agent_id, false, |entry| {
                if entry.rules.contains_key(&path) {
                    Arc::make_mut(&mut entry.rules).remove(&path);
                    true
                } else {
                    false
                }
            })?
            .unwrap_or(false);

        if removed {
            log::info!("🗑️ Policy cleared for agent {} on {}", agent_id, path);
        } else {
            log::debug!("No policy for agent {} on {} to clear", agent_id, path);
        }
        Ok(removed)
    }

    /// Drop every rule of an agent and mark it retiring.
    ///
    /// The agent stays listed until its empty snapshot is acknowledged, then it
    /// is forgotten. An agent with no URL has nothing to revoke remotely and is
    /// forgotten at once. Returns `false` for an unknown agent.
    pub fn remove_agent(&self, agent_id: &str) -> Result<bool> {
        validate_agent_id(agent_id)?;

        let removed = self
            .mutate(agent_id, false, |entry| {
                entry.rules = Arc::new(PolicyMap::new());
                entry.retiring = true;
                true
            })?
            .is_some();

        if removed {
            if self.forget_unroutable(agent_id) {
                log::info!("👋 Agent {} forgotten: no URL registered, nothing to revoke", agent_id);
            } else {
                log::info!("🧹 Agent {} retiring: all policies revoked", agent_id);
            }
        }
        Ok(removed)
    }

    /// Remember where an agent can be reached
    pub fn register_agent(&self, agent_id: &str, agent_url: &str) -> Result<()> {
        validate_agent_id(agent_id)?;
        let agent_url = validate_agent_url(agent_url)?;

        loop {
            let entry = self.entry_or_create(agent_id);
            let mut guard = entry.write();
            if guard.detached {
                continue;
            }
            if guard.agent_url.as_deref() != Some(agent_url.as_str()) {
                log::info!("📡 Agent {} registered at {}", agent_id, agent_url);
                guard.agent_url = Some(agent_url);
            }
            return Ok(());
        }
    }

    pub fn agent_url(&self, agent_id: &str) -> Option<String> {
        self.entry(agent_id).and_then(|entry| entry.read().agent_url.clone())
    }

    /// Immutable copy of an agent's rules. Unknown agents yield an empty map.
    pub fn get_policies(&self, agent_id: &str) -> Arc<PolicyMap> {
        self.snapshot(agent_id).rules
    }

    /// Snapshot with the generation it was taken at, for pushing
    pub fn snapshot(&self, agent_id: &str) -> PolicySnapshot {
        match self.entry(agent_id) {
            Some(entry) => {
                let entry = entry.read();
                PolicySnapshot {
                    agent_id: agent_id.to_string(),
                    generation: entry.generation,
                    rules: Arc::clone(&entry.rules),
                }
            }
            None => PolicySnapshot {
                agent_id: agent_id.to_string(),
                generation: 0,
                rules: Arc::new(PolicyMap::new()),
            },
        }
    }

    /// All agents known to the store (including retiring ones)
    pub fn list_agents(&self) -> BTreeSet<String> {
        self.agents.read().keys().cloned().collect()
    }

    pub fn sync_state(&self, agent_id: &str) -> Option<SyncState> {
        self.entry(agent_id).map(|entry| entry.read().sync_state())
    }

    pub fn sync_status(&self, agent_id: &str) -> Option<AgentSyncStatus> {
        self.entry(agent_id).map(|entry| entry.read().status(agent_id))
    }

    pub fn list_sync_status(&self) -> Vec<AgentSyncStatus> {
        let entries: Vec<(String, Arc<RwLock<AgentEntry>>)> = self
            .agents
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let mut statuses: Vec<AgentSyncStatus> = entries
            .into_iter()
            .map(|(id, entry)| entry.read().status(&id))
            .collect();
        statuses.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        statuses
    }

    /// Should the reconciler push this agent again?
    ///
    /// True when pending (unless the current generation was rejected) or when
    /// the last attempt could not reach the agent.
    pub fn needs_reconciliation(&self, agent_id: &str) -> bool {
        self.entry(agent_id)
            .map(|entry| entry.read().needs_reconciliation())
            .unwrap_or(false)
    }

    /// Record the outcome of pushing `snapshot`.
    ///
    /// A success clears the pending state only when the snapshot is still the
    /// latest generation.
    pub fn record_push(&self, snapshot: &PolicySnapshot, status: PushStatus) -> Result<()> {
        let Some(entry) = self.entry(snapshot.agent_id()) else {
            log::debug!(
                "Push outcome for forgotten agent {} ignored",
                snapshot.agent_id()
            );
            return Ok(());
        };

        let forget = {
            let mut entry = entry.write();
            if snapshot.generation > entry.generation {
                let message = format!(
                    "agent {} acknowledged generation {} but store is at {}",
                    snapshot.agent_id(),
                    snapshot.generation,
                    entry.generation
                );
                log::error!("❌ {}", message);
                return Err(RegistryError::StoreConcurrencyViolation(message));
            }

            let newer_recorded = entry
                .last_push
                .is_some_and(|last| last.generation > snapshot.generation);
            if !newer_recorded {
                entry.last_push = Some(LastPush {
                    generation: snapshot.generation,
                    status,
                    at_ms: unix_now_ms(),
                });
            }

            if status == PushStatus::Success {
                let synced = entry.synced_generation.map_or(snapshot.generation, |g| {
                    g.max(snapshot.generation)
                });
                entry.synced_generation = Some(synced);
            }

            entry.retiring && entry.sync_state() == SyncState::Synced
        };

        if forget {
            self.forget_agent(snapshot.agent_id(), snapshot.generation);
        }
        Ok(())
    }

    /// Drop a retired agent whose empty snapshot has been acknowledged
    fn forget_agent(&self, agent_id: &str, acknowledged: u64) {
        let mut agents = self.agents.write();
        let Some(entry) = agents.get(agent_id).cloned() else {
            return;
        };

        let mut entry = entry.write();
        if entry.retiring && entry.generation == acknowledged && entry.sync_state() == SyncState::Synced {
            entry.detached = true;
            agents.remove(agent_id);
            log::info!("👋 Agent {} forgotten after revocation was acknowledged", agent_id);
        }
    }

    /// Drop a retiring agent nobody can push to
    fn forget_unroutable(&self, agent_id: &str) -> bool {
        let mut agents = self.agents.write();
        let Some(entry) = agents.get(agent_id).cloned() else {
            return false;
        };

        let mut entry = entry.write();
        if entry.retiring && entry.agent_url.is_none() {
            entry.detached = true;
            agents.remove(agent_id);
            return true;
        }
        false
    }

    fn entry(&self, agent_id: &str) -> Option<Arc<RwLock<AgentEntry>>> {
        self.agents.read().get(agent_id).cloned()
    }

    fn entry_or_create(&self, agent_id: &str) -> Arc<RwLock<AgentEntry>> {
        if let Some(entry) = self.entry(agent_id) {
            return entry;
        }

        let mut agents = self.agents.write();
        Arc::clone(agents.entry(agent_id.to_string()).or_insert_with(|| {
            log::debug!("Creating policy table for agent {}", agent_id);
            Arc::new(RwLock::new(AgentEntry::default()))
        }))
    }

    /// Apply `f` under the agent's write lock.
    ///
    /// `f` returns whether it changed the rules; a change bumps the generation.
    /// Returns `None` if the agent is unknown and `create` is false.
    fn mutate<F>(&self, agent_id: &str, create: bool, mut f: F) -> Result<Option<bool>>
    where
        F: FnMut(&mut AgentEntry) -> bool,
    {
        loop {
            let entry = if create {
                self.entry_or_create(agent_id)
            } else {
                match self.entry(agent_id) {
                    Some(entry) => entry,
                    None => return Ok(None),
                }
            };

            let mut entry = entry.write();
            if entry.detached {
                // Forgotten between lookup and lock; look it up again
                continue;
            }

            let changed = f(&mut entry);
            if changed {
                entry.generation = entry.generation.checked_add(1).ok_or_else(|| {
                    RegistryError::StoreConcurrencyViolation(format!(
                        "generation counter overflow for agent {}",
                        agent_id
                    ))
                })?;
            }
            return Ok(Some(changed));
        }
    }
}

fn validate_agent_id(agent_id: &str) -> Result<()> {
    if agent_id.trim().is_empty() {
        return Err(RegistryError::InvalidArgument(
            "agent id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_raw_path(path: &str) -> Result<()> {
    if path.contains('\0') {
        return Err(RegistryError::InvalidArgument(
            "path contains null character".to_string(),
        ));
    }
    Ok(())
}

fn validate_agent_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    let host = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or("");
    if host.is_empty() {
        return Err(RegistryError::InvalidArgument(format!(
            "agent url must be an absolute http(s) url: {:?}",
            url
        )));
    }
    Ok(url.to_string())
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
