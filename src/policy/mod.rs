//! Policy Registry
//! Core Principle: Admin changes land in the store, resolution and pushes only
//! ever see snapshots

mod policy_engine;
mod policy_resolver;
mod policy_rule;
mod policy_store;

pub use policy_engine::{PolicyEngine, UpdateReport};
pub use policy_resolver::{resolve_canonical, PolicyResolver, Resolution};
pub use policy_rule::{Capability, PolicyRule};
pub use policy_store::{
    AgentSyncStatus, LastPush, PolicyMap, PolicySnapshot, PolicyStore, PushStatus, SyncState,
};

use std::sync::Arc;

use crate::path_normalizer::PathNormalizer;

/// Initialize the policy store
pub fn init_store(case_sensitive_paths: bool) -> Arc<PolicyStore> {
    log::info!(
        "🔐 Initializing policy store (case-{} paths)",
        if case_sensitive_paths { "sensitive" } else { "insensitive" }
    );
    PolicyStore::new(PathNormalizer::new(case_sensitive_paths))
}
