use clap::Parser;

use dlp_policy_registry::config::RegistryConfig;
use dlp_policy_registry::error::Result;
use dlp_policy_registry::logging::init_logging;
use dlp_policy_registry::networking::init_admin_api;
use dlp_policy_registry::policy::{init_store, PolicyEngine};
use dlp_policy_registry::shutdown::Shutdown;
use dlp_policy_registry::sync::init_sync;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RegistryConfig::parse();
    init_logging(config.log_level);
    config.validate()?;

    log::info!("==================================================");
    log::info!("DLP Policy Registry v{}", env!("CARGO_PKG_VERSION"));
    log::info!("==================================================");

    let shutdown = Shutdown::new();

    let store = init_store(config.case_sensitive_paths);
    let sync = init_sync(store.clone(), &config, shutdown.listener())?;
    let engine = PolicyEngine::new(store, sync.propagator.clone());

    let scheduler_handle = sync.scheduler.clone().spawn(shutdown.listener());
    let server = init_admin_api(engine, config.bind_address, shutdown.listener()).await?;

    log::info!("✅ Registry running on http://{} (Ctrl+C to stop)", server.local_addr());

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
    }

    log::info!("🛑 Shutting down...");
    shutdown.trigger();

    server.join().await;
    if let Err(e) = scheduler_handle.await {
        log::error!("❌ Reconciliation scheduler task failed: {}", e);
    }

    log::info!("👋 DLP Policy Registry stopped");
    Ok(())
}
