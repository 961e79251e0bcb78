//! Gambit Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - HTTP API + WebSocket for clients (lobbies, rounds, submissions)
//! - Supervised background scheduler driving round expiry and scoring

use crate::api::{self, AppState};
use crate::error::Result;
use crate::lifecycle::RoundScheduler;
use crate::storage::Store;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Capacity of the round-event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for a Gambit node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// How often the scheduler checks for expired rounds. Must be
    /// materially shorter than the shortest round duration.
    pub poll_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("GAMBIT_DATA_DIR").unwrap_or_else(|_| "./gambit-data".to_string()),
        );

        let api_addr = std::env::var("GAMBIT_API_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid GAMBIT_API_ADDR");

        let poll_secs = std::env::var("GAMBIT_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(5)
            .max(1);

        Self {
            data_dir,
            api_addr,
            poll_interval: Duration::from_secs(poll_secs),
        }
    }
}

/// A Gambit node instance.
pub struct GambitNode {
    state: Arc<AppState>,
    config: NodeConfig,
}

impl GambitNode {
    /// Create a new Gambit node.
    pub fn new(config: NodeConfig) -> Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        // Open single shared store instance
        let store = Arc::new(Store::open(&config.data_dir)?);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let scheduler = Arc::new(RoundScheduler::new(
            Arc::clone(&store),
            events.clone(),
            config.poll_interval,
        ));

        let state = Arc::new(AppState {
            store,
            events,
            scheduler,
        });

        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the node (starts the scheduler and the HTTP server).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Gambit node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Data: {:?}", self.config.data_dir);
        tracing::info!("  Poll interval: {:?}", self.config.poll_interval);

        // Supervised scheduler: stopped via the watch channel on shutdown.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(&self.state.scheduler);
        let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

        // Build HTTP API
        let app = api::build_router(self.state());

        // Start HTTP server
        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // Server is down; signal the scheduler and wait for it.
        let _ = shutdown_tx.send(true);
        let _ = scheduler_task.await;
        tracing::info!("Gambit node stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
