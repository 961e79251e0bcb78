//! Score propagation along delegation chains.
//!
//! Every chain resolves to one of four outcomes - a cycle, a correct
//! solve, an incorrect solve, or a pass - and the outcome propagates
//! upward hop by hop. Evaluation is an iterative walk-and-unwind over
//! the arena with a per-node resolution cache: descend the chain until
//! a resolved or terminal node, then score the stacked delegators in
//! reverse. No recursion, and every node is resolved exactly once even
//! when shared by many chains.

use serde::{Deserialize, Serialize};

use crate::graph::{Action, ActionRecord, DelegationGraph, Node};
use crate::params::ScoringParams;
use crate::Result;

/// What a node's delegation chain leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// The chain enters a cycle (or the node is inside one)
    Cycle,
    /// The chain ends in a correct solve
    Correct,
    /// The chain ends in an incorrect solve
    Incorrect,
    /// The chain ends in a pass
    Pass,
}

/// Compute `score` and `distance` for every node.
///
/// Requires `mark_cycles` to have run; cycle membership dominates every
/// other classification.
pub fn propagate_scores(graph: &mut DelegationGraph, params: &ScoringParams) {
    let n = graph.nodes.len();
    let mut cache: Vec<Option<Resolution>> = vec![None; n];
    let mut stack: Vec<usize> = Vec::new();

    for start in 0..n {
        if cache[start].is_some() {
            continue;
        }

        // Descend until something already resolved or terminal.
        let mut cur = start;
        loop {
            if cache[cur].is_some() {
                break;
            }
            match terminal_resolution(&graph.nodes[cur], params) {
                Some((res, distance, score)) => {
                    let node = &mut graph.nodes[cur];
                    node.distance = distance;
                    node.score = score;
                    cache[cur] = Some(res);
                    break;
                }
                None => {
                    // A non-cycle delegate can't point back into this
                    // descent - that loop would already be marked - so
                    // the walk always terminates.
                    stack.push(cur);
                    cur = graph.nodes[cur].target.expect("non-terminal node has a target");
                }
            }
        }

        // Unwind: each stacked delegator scores off its now-resolved target.
        while let Some(i) = stack.pop() {
            let target = graph.nodes[i].target.expect("stacked node has a target");
            let target_res = cache[target].expect("target resolved before unwind");
            let (res, distance, score) =
                delegate_resolution(target_res, graph.nodes[target].distance, params);
            let node = &mut graph.nodes[i];
            node.distance = distance;
            node.score = score;
            cache[i] = Some(res);
        }
    }
}

/// Resolve a node that needs no target: cycle members, solvers, passers,
/// and delegators whose target doesn't exist.
fn terminal_resolution(
    node: &Node,
    params: &ScoringParams,
) -> Option<(Resolution, Option<u32>, f64)> {
    if node.in_cycle {
        return Some((Resolution::Cycle, None, -1.0 - params.gamma));
    }
    match node.action {
        Action::Solve => {
            if node.is_correct == Some(true) {
                let trust_bonus = params.beta * f64::from(node.in_degree);
                Some((Resolution::Correct, Some(0), 1.0 + trust_bonus))
            } else {
                Some((Resolution::Incorrect, Some(0), -1.0))
            }
        }
        Action::Pass => Some((Resolution::Pass, None, params.pass_score)),
        Action::Delegate => {
            if node.target.is_none() {
                // Data-integrity fault, degraded to the cycle penalty so
                // a bad reference can never hang round completion.
                Some((Resolution::Cycle, None, -1.0 - params.gamma))
            } else {
                None
            }
        }
    }
}

/// Score a delegator from its resolved target.
fn delegate_resolution(
    target: Resolution,
    target_distance: Option<u32>,
    params: &ScoringParams,
) -> (Resolution, Option<u32>, f64) {
    match target {
        Resolution::Cycle => {
            // Direct neighbors of the cycle are at k = 1.
            let k = target_distance.map_or(1, |d| d + 1);
            let score = -1.0 - params.gamma / f64::from(k + 1);
            (Resolution::Cycle, Some(k), score)
        }
        Resolution::Correct => {
            let k = target_distance.unwrap_or(0) + 1;
            let kf = f64::from(k);
            let score = 1.0 + params.lambda * (2.0 * kf / (kf + 1.0));
            (Resolution::Correct, Some(k), score)
        }
        Resolution::Incorrect => {
            let k = target_distance.unwrap_or(0) + 1;
            (Resolution::Incorrect, Some(k), -1.0)
        }
        Resolution::Pass => {
            // The passer itself records no distance; it is the terminus.
            let k = target_distance.unwrap_or(0) + 1;
            (Resolution::Pass, Some(k), -1.0)
        }
    }
}

/// A fully scored participant, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    /// Participant identifier
    pub participant_id: String,
    /// The action scored (synthesized passes included)
    pub action: Action,
    /// Delegation target, if any (for graph payloads)
    pub delegate_to: Option<String>,
    /// Final score
    pub score: f64,
    /// Cycle membership
    pub in_cycle: bool,
    /// Hop-count to the chain terminus
    pub distance: Option<u32>,
}

/// Run the whole engine on one round's worth of actions.
///
/// Builds the graph (synthesizing passes for silent roster members),
/// marks cycles, propagates scores. Pure: identical inputs always give
/// identical output, so re-running on a completed round is a no-op in
/// effect.
pub fn score_round(
    records: &[ActionRecord],
    roster: &[String],
    correct_answer: &str,
    params: &ScoringParams,
) -> Result<Vec<ScoredNode>> {
    params.validate()?;

    let mut graph = DelegationGraph::build(records, roster, correct_answer);
    crate::cycle::mark_cycles(&mut graph.nodes);
    propagate_scores(&mut graph, params);

    Ok(graph
        .nodes
        .into_iter()
        .map(|node| ScoredNode {
            participant_id: node.participant_id,
            action: node.action,
            delegate_to: node.target_id,
            score: node.score,
            in_cycle: node.in_cycle,
            distance: node.distance,
        })
        .collect())
}
