//! Reconciliation Scheduler
//! Core Principle: Periodically re-push every agent the registry is not sure about

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::policy::PolicyStore;
use crate::shutdown::ShutdownListener;

use super::propagator::{PushTrigger, Propagator};

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Reconciling,
}

/// What one sweep did
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Agents a push task was spawned for
    pub dispatched: Vec<String>,
    /// Due agents skipped because a push for them is still running
    pub skipped_in_flight: Vec<String>,
    /// Due agents skipped because no URL is known for them
    pub skipped_unroutable: Vec<String>,
    pub handles: Vec<JoinHandle<()>>,
}

impl ReconcileReport {
    /// Wait for every dispatched push to finish
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                log::error!("❌ Reconciliation push task failed: {}", e);
            }
        }
    }
}

pub struct ReconciliationScheduler {
    store: Arc<PolicyStore>,
    propagator: Arc<Propagator>,
    interval: Duration,
    state: Mutex<SchedulerState>,
}

impl ReconciliationScheduler {
    pub fn new(store: Arc<PolicyStore>, propagator: Arc<Propagator>, interval: Duration) -> Arc<Self> {
        Arc::new(ReconciliationScheduler {
            store,
            propagator,
            interval,
            state: Mutex::new(SchedulerState::Idle),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// One sweep: spawn a push for every due agent that is not already in flight
    pub fn reconcile_once(&self) -> ReconcileReport {
        *self.state.lock() = SchedulerState::Reconciling;
        let mut report = ReconcileReport::default();

        for agent_id in self.store.list_agents() {
            if !self.store.needs_reconciliation(&agent_id) {
                continue;
            }

            if self.store.agent_url(&agent_id).is_none() {
                log::debug!("Agent {} is due but has no URL, skipping", agent_id);
                report.skipped_unroutable.push(agent_id);
                continue;
            }

            let Some(guard) = self.propagator.try_reserve(&agent_id) else {
                log::debug!("Agent {} still has a push in flight, skipping this cycle", agent_id);
                report.skipped_in_flight.push(agent_id);
                continue;
            };

            let propagator = Arc::clone(&self.propagator);
            let handle = tokio::spawn(async move {
                // Background failures are logged by the propagator and never surfaced
                if let Err(e) = propagator.push_reserved(guard, PushTrigger::Reconciliation).await {
                    log::error!("❌ Reconciliation push aborted: {}", e);
                }
            });
            report.dispatched.push(agent_id);
            report.handles.push(handle);
        }

        if !report.dispatched.is_empty() || !report.skipped_in_flight.is_empty() {
            log::info!(
                "🔄 Reconciliation sweep: {} dispatched, {} in flight, {} unroutable",
                report.dispatched.len(),
                report.skipped_in_flight.len(),
                report.skipped_unroutable.len()
            );
        }

        *self.state.lock() = SchedulerState::Idle;
        report
    }

    /// Sweep every `interval` until shutdown, then wait for running pushes
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownListener) {
        log::info!(
            "⏱️  Reconciliation scheduler started (every {}ms)",
            self.interval.as_millis()
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut running: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    running.retain(|handle| !handle.is_finished());
                    running.extend(self.reconcile_once().handles);
                }
            }
        }

        log::info!(
            "🛑 Reconciliation scheduler stopping, {} push(es) being cancelled",
            running.iter().filter(|h| !h.is_finished()).count()
        );
        for handle in running {
            let _ = handle.await;
        }
    }

    pub fn spawn(self: Arc<Self>, shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
