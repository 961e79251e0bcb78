//! Round model and lifecycle status.

use gambit_scoring::ScoringParams;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a round. Monotonic; `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    /// Created but not yet open for submissions
    Pending,
    /// Open for submissions, timer running
    Active,
    /// Timer expired or ended by an admin; scores computed
    Completed,
}

/// One round of the trust game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Round {
    /// Unique identifier (blake3 hash, hex)
    pub id: String,

    /// Game this round belongs to
    pub game_id: String,

    /// Lobby whose members are expected to act
    pub lobby_id: String,

    /// 1-based position within the game
    pub round_number: u32,

    /// The question shown to participants
    pub question: String,

    /// The answer SOLVE submissions are checked against
    pub correct_answer: String,

    /// Round length once started
    pub duration_secs: u64,

    /// Lifecycle status
    pub status: RoundStatus,

    /// Unix seconds when the round went Active
    pub start_time: Option<u64>,

    /// Unix seconds when the round completed
    pub end_time: Option<u64>,

    /// Scoring parameters for this round
    pub params: ScoringParams,
}

impl Round {
    /// Create a new round in `Pending` state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        game_id: String,
        lobby_id: String,
        round_number: u32,
        question: String,
        correct_answer: String,
        duration_secs: u64,
        params: ScoringParams,
    ) -> Self {
        Self {
            id,
            game_id,
            lobby_id,
            round_number,
            question,
            correct_answer,
            duration_secs,
            status: RoundStatus::Pending,
            start_time: None,
            end_time: None,
            params,
        }
    }

    /// Generate a round ID from content hash.
    pub fn generate_id(content: &[u8]) -> String {
        let hash = blake3::hash(content);
        hex::encode(hash.as_bytes())
    }

    /// The instant the timer runs out, if the round has started.
    pub fn expires_at(&self) -> Option<u64> {
        self.start_time.map(|start| start + self.duration_secs)
    }

    /// Whether an active round's timer has run out at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.status == RoundStatus::Active
            && self.expires_at().is_some_and(|expiry| now >= expiry)
    }
}
