//! Registry -> Agent Synchronization
//! Core Principle: Push the full snapshot on every change, sweep periodically
//! for anything that did not land

mod propagator;
mod protocol;
mod reconciler;
mod sync_client;

pub use propagator::{InFlightGuard, Propagator, PushTrigger};
pub use protocol::{decode_ack, encode_policy_update, policy_update_url, AgentAck, POLICY_UPDATE_PATH};
pub use reconciler::{ReconcileReport, ReconciliationScheduler, SchedulerState};
pub use sync_client::{PushOutcome, SyncClient};

use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::policy::PolicyStore;
use crate::shutdown::ShutdownListener;

/// Sync components wired to one store
pub struct SyncLayer {
    pub propagator: Arc<Propagator>,
    pub scheduler: Arc<ReconciliationScheduler>,
}

/// Initialize the sync layer
pub fn init_sync(
    store: Arc<PolicyStore>,
    config: &RegistryConfig,
    shutdown: ShutdownListener,
) -> Result<SyncLayer> {
    log::info!(
        "📡 Initializing sync layer (push timeout {}ms, reconciliation every {}ms)",
        config.push_timeout_ms,
        config.reconciliation_interval_ms
    );

    let client = Arc::new(SyncClient::new(config.push_timeout(), shutdown)?);
    let propagator = Propagator::new(Arc::clone(&store), client);
    let scheduler = ReconciliationScheduler::new(
        store,
        Arc::clone(&propagator),
        config.reconciliation_interval(),
    );

    Ok(SyncLayer {
        propagator,
        scheduler,
    })
}
