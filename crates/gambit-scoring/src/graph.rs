//! Delegation graph construction.
//!
//! Each round's submissions become one node per participant, with at most
//! one outgoing edge per node (a DELEGATE pointing at its target). The
//! graph is arena-indexed: nodes live in a flat `Vec` and edges are plain
//! indices, so later stages memoize into arrays instead of maps.
//!
//! Roster members who never acted get a synthesized PASS node here -
//! silence is an explicit economic choice with a score attached.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What a participant did this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Answered the question directly
    Solve,
    /// Pointed at another participant to answer for them
    Delegate,
    /// Opted out
    Pass,
}

/// One participant's action, as fed to the engine.
///
/// This is the engine's whole view of a submission - identity, answer
/// text, and delegation target. Anything else (timestamps, provenance)
/// stays with the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    /// Stable participant identifier
    pub participant_id: String,
    /// The chosen action
    pub action: Action,
    /// Answer text (SOLVE only)
    pub answer: Option<String>,
    /// Delegation target (DELEGATE only)
    pub delegate_to: Option<String>,
}

impl ActionRecord {
    /// A solve with the given answer.
    pub fn solve(participant_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            action: Action::Solve,
            answer: Some(answer.into()),
            delegate_to: None,
        }
    }

    /// A delegation to the given target.
    pub fn delegate(participant_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            action: Action::Delegate,
            answer: None,
            delegate_to: Some(target.into()),
        }
    }

    /// An explicit pass.
    pub fn pass(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            action: Action::Pass,
            answer: None,
            delegate_to: None,
        }
    }
}

/// One node of the delegation graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Participant this node belongs to
    pub participant_id: String,
    /// The action taken (or synthesized)
    pub action: Action,
    /// SOLVE correctness; `None` for non-SOLVE nodes
    pub is_correct: Option<bool>,
    /// Delegation target as an arena index, if it resolved
    pub target: Option<usize>,
    /// Original target identifier (kept for the edge list)
    pub target_id: Option<String>,
    /// DELEGATE named a participant the round doesn't know
    pub target_missing: bool,
    /// Number of direct delegators pointing here
    pub in_degree: u32,
    /// Set by the cycle detector
    pub in_cycle: bool,
    /// Hop-count to the chain's terminus; `None` for cycles and passes
    pub distance: Option<u32>,
    /// Final score, set by the propagator
    pub score: f64,
}

impl Node {
    fn new(participant_id: String, action: Action) -> Self {
        Self {
            participant_id,
            action,
            is_correct: None,
            target: None,
            target_id: None,
            target_missing: false,
            in_degree: 0,
            in_cycle: false,
            distance: None,
            score: 0.0,
        }
    }
}

/// The delegation graph for one round: arena of nodes plus an id index.
#[derive(Debug)]
pub struct DelegationGraph {
    /// Nodes, one per participant
    pub nodes: Vec<Node>,
    /// participant id → arena index
    pub index: HashMap<String, usize>,
}

impl DelegationGraph {
    /// Build the graph from a round's action records and the roster.
    ///
    /// Roster members without a record become PASS nodes. Duplicate
    /// records for one participant keep the first occurrence (the store
    /// enforces uniqueness upstream; the engine just stays deterministic).
    /// `correct_answer` decides SOLVE correctness: trimmed,
    /// case-insensitive equality.
    pub fn build(records: &[ActionRecord], roster: &[String], correct_answer: &str) -> Self {
        let mut nodes = Vec::with_capacity(records.len() + roster.len());
        let mut index = HashMap::with_capacity(records.len() + roster.len());

        for record in records {
            if index.contains_key(&record.participant_id) {
                continue;
            }
            let mut node = Node::new(record.participant_id.clone(), record.action);
            if record.action == Action::Solve {
                node.is_correct = Some(
                    record
                        .answer
                        .as_deref()
                        .is_some_and(|answer| answers_match(answer, correct_answer)),
                );
            }
            if record.action == Action::Delegate {
                node.target_id = record.delegate_to.clone();
            }
            index.insert(record.participant_id.clone(), nodes.len());
            nodes.push(node);
        }

        // Silent roster members pass implicitly.
        for member in roster {
            if index.contains_key(member) {
                continue;
            }
            index.insert(member.clone(), nodes.len());
            nodes.push(Node::new(member.clone(), Action::Pass));
        }

        // Resolve edges and count direct delegators.
        for i in 0..nodes.len() {
            let Some(target_id) = nodes[i].target_id.clone() else {
                continue;
            };
            match index.get(&target_id) {
                Some(&t) => {
                    nodes[i].target = Some(t);
                    nodes[t].in_degree += 1;
                }
                None => nodes[i].target_missing = true,
            }
        }

        Self { nodes, index }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by participant id.
    pub fn get(&self, participant_id: &str) -> Option<&Node> {
        self.index.get(participant_id).map(|&i| &self.nodes[i])
    }
}

/// Answer comparison: whitespace-trimmed, case-insensitive.
fn answers_match(answer: &str, correct: &str) -> bool {
    answer.trim().to_lowercase() == correct.trim().to_lowercase()
}
