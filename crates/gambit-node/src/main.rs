//! Gambit Node binary
//!
//! A trust-game server node: rounds, delegation scoring, live events.

use gambit_node::{GambitNode, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gambit_node=info,gambit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gambit Node");

    let config = NodeConfig::default();

    let node = GambitNode::new(config)?;
    node.run().await?;

    Ok(())
}
