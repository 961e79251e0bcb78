//! Scoring parameters, configured per round.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// The tunable knobs of the delegation scoring formulas.
///
/// - `lambda` scales the reward for delegating into a chain that ends in
///   a correct solve: `1 + λ·(2k/(k+1))` at hop-distance `k`.
/// - `beta` is the trust bonus a correct solver earns per *direct*
///   delegator: `1 + β·delegators`.
/// - `gamma` is the cycle penalty: `-1 - γ` inside a cycle,
///   `-1 - γ/(k+1)` when delegating into one at hop-distance `k`.
/// - `pass_score` is awarded for a standalone pass (explicit or
///   synthesized for a silent participant).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    /// Delegation reward factor
    pub lambda: f64,
    /// Trust bonus per direct delegator
    pub beta: f64,
    /// Cycle penalty factor
    pub gamma: f64,
    /// Score for passing
    #[serde(default)]
    pub pass_score: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            beta: 0.1,
            gamma: 0.2,
            pass_score: 0.0,
        }
    }
}

impl ScoringParams {
    /// Validate the parameters.
    ///
    /// `lambda`, `beta` and `gamma` must be finite and non-negative;
    /// `pass_score` must be finite.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lambda", self.lambda),
            ("beta", self.beta),
            ("gamma", self.gamma),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParam { name, value });
            }
        }
        if !self.pass_score.is_finite() {
            return Err(Error::InvalidParam {
                name: "pass_score",
                value: self.pass_score,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ScoringParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_negative_factors() {
        let params = ScoringParams {
            gamma: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(Error::InvalidParam { name: "gamma", .. })
        ));
    }

    #[test]
    fn rejects_non_finite() {
        let params = ScoringParams {
            lambda: f64::NAN,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ScoringParams {
            pass_score: f64::INFINITY,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn negative_pass_score_is_allowed() {
        let params = ScoringParams {
            pass_score: -1.0,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }
}
