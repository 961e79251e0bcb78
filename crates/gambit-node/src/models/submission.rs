//! Submission model - one action per (round, participant).

use gambit_scoring::{Action, ActionRecord};
use serde::{Deserialize, Serialize};

/// A participant's action for one round.
///
/// At most one exists per (round, participant) - the store enforces
/// that. `synthesized` marks PASS records the lifecycle controller
/// materialized at completion for roster members who never acted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    /// Round this submission belongs to
    pub round_id: String,

    /// The acting participant
    pub participant_id: String,

    /// The chosen action
    pub action: Action,

    /// Answer text (SOLVE only)
    pub answer: Option<String>,

    /// Delegation target (DELEGATE only)
    pub delegate_to: Option<String>,

    /// True for passes created on behalf of silent participants
    #[serde(default)]
    pub synthesized: bool,

    /// Unix seconds when the submission was recorded
    pub submitted_at: u64,
}

impl Submission {
    /// Create an explicit submission.
    pub fn new(
        round_id: String,
        participant_id: String,
        action: Action,
        answer: Option<String>,
        delegate_to: Option<String>,
        submitted_at: u64,
    ) -> Self {
        Self {
            round_id,
            participant_id,
            action,
            answer,
            delegate_to,
            synthesized: false,
            submitted_at,
        }
    }

    /// A PASS materialized for a participant who never acted.
    pub fn synthesized_pass(round_id: String, participant_id: String, now: u64) -> Self {
        Self {
            round_id,
            participant_id,
            action: Action::Pass,
            answer: None,
            delegate_to: None,
            synthesized: true,
            submitted_at: now,
        }
    }

    /// Check the action's shape: SOLVE carries an answer, DELEGATE a
    /// target, PASS neither.
    pub fn shape_error(&self) -> Option<&'static str> {
        match self.action {
            Action::Solve if self.answer.is_none() => Some("SOLVE requires an answer"),
            Action::Delegate if self.delegate_to.is_none() => {
                Some("DELEGATE requires a target")
            }
            Action::Pass if self.answer.is_some() || self.delegate_to.is_some() => {
                Some("PASS carries neither answer nor target")
            }
            _ => None,
        }
    }

    /// The engine's view of this submission.
    pub fn record(&self) -> ActionRecord {
        ActionRecord {
            participant_id: self.participant_id.clone(),
            action: self.action,
            answer: self.answer.clone(),
            delegate_to: self.delegate_to.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_checks() {
        let solve = Submission::new(
            "r".into(),
            "p".into(),
            Action::Solve,
            None,
            None,
            0,
        );
        assert!(solve.shape_error().is_some());

        let delegate = Submission::new(
            "r".into(),
            "p".into(),
            Action::Delegate,
            None,
            None,
            0,
        );
        assert!(delegate.shape_error().is_some());

        let pass = Submission::new(
            "r".into(),
            "p".into(),
            Action::Pass,
            Some("x".into()),
            None,
            0,
        );
        assert!(pass.shape_error().is_some());

        let ok = Submission::new(
            "r".into(),
            "p".into(),
            Action::Solve,
            Some("answer".into()),
            None,
            0,
        );
        assert!(ok.shape_error().is_none());
    }

    #[test]
    fn synthesized_pass_is_marked() {
        let sub = Submission::synthesized_pass("r".into(), "ghost".into(), 42);
        assert!(sub.synthesized);
        assert_eq!(sub.action, Action::Pass);
        assert!(sub.shape_error().is_none());
    }

    #[test]
    fn action_wire_format() {
        let sub = Submission::new(
            "r".into(),
            "p".into(),
            Action::Delegate,
            None,
            Some("q".into()),
            0,
        );
        let json = serde_json::to_string(&sub).unwrap();
        assert!(json.contains("\"DELEGATE\""));
    }
}
