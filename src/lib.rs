//! Central DLP policy registry.
//!
//! Stores per-agent file-access rules keyed by canonical path and keeps every
//! agent's enforcement state converged with the registry by pushing full
//! snapshots on change and re-pushing from a periodic reconciliation sweep.

pub mod config;
pub mod error;
pub mod logging;
pub mod networking;
pub mod path_normalizer;
pub mod policy;
pub mod shutdown;
pub mod sync;

#[cfg(test)]
mod tests;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use path_normalizer::{normalize_path, CanonicalPath, PathNormalizer};
pub use policy::{PolicyEngine, PolicyResolver, PolicyRule, PolicySnapshot, PolicyStore};
pub use shutdown::{Shutdown, ShutdownListener};
pub use sync::{PushOutcome, ReconciliationScheduler, SyncClient};
