//! Local HTTP API over a shared design engine

pub mod handlers;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use skyplan_core::DesignEngine;
use tokio::sync::RwLock;

/// Where the server listens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

/// State shared by every request. The engine is single-writer; the lock
/// serializes mutations.
pub struct ServerState {
    pub engine: RwLock<DesignEngine>,
}

impl ServerState {
    pub fn new(engine: DesignEngine) -> Self {
        ServerState {
            engine: RwLock::new(engine),
        }
    }
}

pub struct SkyplanServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl SkyplanServer {
    pub fn new(engine: DesignEngine, config: ServerConfig) -> Self {
        SkyplanServer {
            state: Arc::new(ServerState::new(engine)),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.config.host, self.config.port))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        tracing::info!("Skyplan API listening on http://{}", listener.local_addr()?);

        let app = router::create_router(self.state);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
