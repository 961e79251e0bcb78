//! Persisted scoring result per (round, participant).

use gambit_scoring::ScoredNode;
use serde::{Deserialize, Serialize};

/// One participant's score for one round.
///
/// A pure function of the round's submissions and parameters, so
/// recomputation overwrites deterministically and re-running the
/// engine is a no-op in effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundScore {
    /// Round the score belongs to
    pub round_id: String,

    /// The scored participant
    pub participant_id: String,

    /// Final score
    pub total_score: f64,

    /// Whether the participant sat on a delegation cycle
    pub in_cycle: bool,

    /// Hop-count to the chain's terminus; `None` for cycles and passes
    pub distance: Option<u32>,
}

impl RoundScore {
    /// Build the persistent record from an engine result.
    pub fn from_scored(round_id: &str, node: &ScoredNode) -> Self {
        Self {
            round_id: round_id.to_string(),
            participant_id: node.participant_id.clone(),
            total_score: node.score,
            in_cycle: node.in_cycle,
            distance: node.distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_scoring::Action;

    #[test]
    fn from_scored_copies_fields() {
        let node = ScoredNode {
            participant_id: "alice".into(),
            action: Action::Delegate,
            delegate_to: Some("bob".into()),
            score: 1.6,
            in_cycle: false,
            distance: Some(1),
        };
        let score = RoundScore::from_scored("r1", &node);
        assert_eq!(score.round_id, "r1");
        assert_eq!(score.participant_id, "alice");
        assert_eq!(score.total_score, 1.6);
        assert_eq!(score.distance, Some(1));
    }
}
