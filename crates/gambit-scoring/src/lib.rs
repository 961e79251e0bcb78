//! Delegation Graph Scoring Engine
//!
//! Each round of the trust game, every participant either solves the
//! question, delegates their answer to another participant, or passes.
//! This crate turns one round's worth of actions into per-participant
//! scores:
//!
//! 1. **Graph builder** - one node per participant (silent roster
//!    members become synthesized passes), one edge per delegation.
//! 2. **Cycle detector** - iterative DFS marks every delegation loop,
//!    self-delegation included.
//! 3. **Score propagator** - memoized chain evaluation: correct solves
//!    earn a trust bonus per direct delegator, delegators are rewarded
//!    by distance to a correct terminus, cycles are penalized and the
//!    penalty decays upstream.
//!
//! The engine is pure and synchronous: no I/O, no clocks, no failure
//! modes beyond invalid parameters. Malformed input (a delegation
//! target nobody knows) degrades to the cycle penalty rather than
//! erroring, so a scoring run can never hang a round on bad data.

mod cycle;
mod error;
mod graph;
mod params;
mod propagate;

pub use cycle::mark_cycles;
pub use error::{Error, Result};
pub use graph::{Action, ActionRecord, DelegationGraph, Node};
pub use params::ScoringParams;
pub use propagate::{propagate_scores, score_round, ScoredNode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pipeline_smoke() {
        let records = vec![
            ActionRecord::solve("alice", "paris"),
            ActionRecord::delegate("bob", "alice"),
        ];
        let roster = vec!["alice".to_string(), "bob".to_string(), "eve".to_string()];
        let scored = score_round(&records, &roster, "PARIS", &ScoringParams::default()).unwrap();

        assert_eq!(scored.len(), 3);
        assert!(scored.iter().all(|s| s.score.is_finite()));
    }
}
