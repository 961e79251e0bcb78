//! Gambit Node - Trust Game Server
//!
//! A multiplayer trust-game node: each round, every participant either
//! answers a question, delegates to another participant, or passes.
//! When the round's timer runs out the delegation graph is scored and
//! results are pushed to connected clients.
//!
//! # Architecture
//!
//! - **Models**: Rounds, submissions, scores, lobbies
//! - **Storage**: RocksDB-backed persistent store with guarded writes
//! - **Lifecycle**: Supervised poller driving expiry → scoring → notify
//! - **API**: HTTP endpoints for game management and submissions
//! - **WS**: Real-time round event stream
//!
//! Scoring itself lives in the pure [`gambit_scoring`] crate.
//!
//! # Example
//!
//! ```no_run
//! use gambit_node::{GambitNode, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let node = GambitNode::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod node;
pub mod storage;
pub mod ws;

pub use error::{Error, RejectReason, Result};
pub use lifecycle::RoundScheduler;
pub use models::{Lobby, Round, RoundScore, RoundStatus, Submission};
pub use node::{GambitNode, NodeConfig};
pub use storage::Store;
pub use ws::{EndReason, RoundEvent};
