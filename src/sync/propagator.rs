//! Propagator - snapshot, push, record outcome
//! Shared by the immediate push after an admin change and the reconciler

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::Result;
use crate::policy::PolicyStore;

use super::sync_client::{PushOutcome, SyncClient};

/// Why a push is happening; decides how failures are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTrigger {
    /// Right after an admin change; failures go back to the caller
    Immediate,
    /// Background sweep; failures are only logged
    Reconciliation,
}

impl PushTrigger {
    fn label(&self) -> &'static str {
        match self {
            PushTrigger::Immediate => "immediate",
            PushTrigger::Reconciliation => "reconciliation",
        }
    }
}

/// Marks a push for one agent as in flight until dropped.
///
/// Holds the agent's push lock, so no second push for the same agent can
/// snapshot, send or record while this one is running.
#[derive(Debug)]
pub struct InFlightGuard {
    _lock: OwnedMutexGuard<()>,
    agent_id: String,
}

impl InFlightGuard {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

pub struct Propagator {
    store: Arc<PolicyStore>,
    client: Arc<SyncClient>,
    push_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>, // agent_id -> push lock
}

impl Propagator {
    pub fn new(store: Arc<PolicyStore>, client: Arc<SyncClient>) -> Arc<Self> {
        Arc::new(Propagator {
            store,
            client,
            push_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn is_in_flight(&self, agent_id: &str) -> bool {
        self.push_locks
            .lock()
            .get(agent_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Reserve the agent only if no push for it is running
    pub fn try_reserve(&self, agent_id: &str) -> Option<InFlightGuard> {
        let lock = self.push_lock(agent_id).try_lock_owned().ok()?;
        Some(InFlightGuard {
            _lock: lock,
            agent_id: agent_id.to_string(),
        })
    }

    /// Reserve the agent, queueing behind a push that is already running
    async fn reserve(&self, agent_id: &str) -> InFlightGuard {
        let lock = self.push_lock(agent_id).lock_owned().await;
        InFlightGuard {
            _lock: lock,
            agent_id: agent_id.to_string(),
        }
    }

    fn push_lock(&self, agent_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.push_locks.lock();
        // Forgotten agents leave idle locks behind; drop them on the way
        locks.retain(|id, lock| id == agent_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(agent_id.to_string()).or_default())
    }

    /// Push the agent's current snapshot right now
    pub async fn push_agent(&self, agent_id: &str, trigger: PushTrigger) -> Result<PushOutcome> {
        let guard = self.reserve(agent_id).await;
        self.push_reserved(guard, trigger).await
    }

    /// Push under an existing reservation; the reservation ends with the push.
    ///
    /// The snapshot is taken after the reservation, so a push that waited
    /// sends everything stored up to that point.
    pub async fn push_reserved(&self, guard: InFlightGuard, trigger: PushTrigger) -> Result<PushOutcome> {
        let agent_id = guard.agent_id();

        let Some(agent_url) = self.store.agent_url(agent_id) else {
            log::warn!(
                "⚠️  No URL registered for agent {}; {} push skipped",
                agent_id,
                trigger.label()
            );
            return Ok(PushOutcome::AgentUnreachable {
                reason: "no agent url registered".to_string(),
            });
        };

        let snapshot = self.store.snapshot(agent_id);
        let outcome = self.client.push(&agent_url, agent_id, &snapshot).await;
        self.store.record_push(&snapshot, outcome.status())?;

        match &outcome {
            PushOutcome::Success => log::info!(
                "✅ Agent {} acknowledged {} rules (generation {}, {} push)",
                agent_id,
                snapshot.len(),
                snapshot.generation(),
                trigger.label()
            ),
            PushOutcome::AgentUnreachable { reason } => log::warn!(
                "⚠️  Agent {} unreachable during {} push: {}",
                agent_id,
                trigger.label(),
                reason
            ),
            PushOutcome::AgentRejected { status, reason } => log::error!(
                "❌ Agent {} rejected {} push (status {}): {}",
                agent_id,
                trigger.label(),
                status,
                reason
            ),
        }

        drop(guard);
        Ok(outcome)
    }
}
