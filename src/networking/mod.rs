// src/networking/mod.rs
//! Networking Layer
//! Core Principle: Expose the policy engine to the admin UI over HTTP

mod admin_server;

pub use admin_server::{
    router, serve, ClearRuleQuery, ErrorResponse, RegisterAgentRequest, ResolveQuery,
    ServerState, SetRuleQuery, StandardApiResponse,
};

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;
use crate::policy::PolicyEngine;
use crate::shutdown::ShutdownListener;

/// Start the admin API in the background
pub async fn init_admin_api(
    engine: Arc<PolicyEngine>,
    bind_address: SocketAddr,
    shutdown: ShutdownListener,
) -> Result<ServerHandle> {
    log::info!("🌐 Initializing admin API on {}", bind_address);

    // Bind here so address errors surface before startup completes
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    let local_addr = listener.local_addr()?;
    let app = router(engine);

    let server_handle = tokio::spawn(async move {
        let mut shutdown = shutdown;
        if let Err(e) = serve(listener, app, async move { shutdown.wait().await }).await {
            log::error!("❌ Admin API server error: {}", e);
        }
    });

    log::info!("✅ Admin API ready on http://{}", local_addr);
    Ok(ServerHandle {
        server_handle,
        local_addr,
    })
}

/// Handle to the running admin API
pub struct ServerHandle {
    server_handle: tokio::task::JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server to finish after shutdown was triggered
    pub async fn join(self) {
        if let Err(e) = self.server_handle.await {
            log::error!("❌ Admin API task failed: {}", e);
        }
    }
}
