//! Consensus scoring formula
//!
//! ```text
//! consensus_score  = weighted_confidence
//!                  + vote_count * vote_bonus
//!                  + average_factor * (total_confidence / vote_count)
//! final_confidence = min(100, round(consensus_score))
//! ```
//!
//! The constants (10, 0.5) are empirically tuned. They are kept as defaults
//! and exposed as parameters rather than hard-coded.

use huerta_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunable constants of the consensus formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Fixed, unweighted bonus per agreeing source
    pub vote_bonus: f64,
    /// Multiplier applied to the unweighted average confidence
    pub average_factor: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            vote_bonus: 10.0,
            average_factor: 0.5,
        }
    }
}

impl ScoringParams {
    pub fn validate(&self) -> Result<()> {
        if !self.vote_bonus.is_finite() || self.vote_bonus < 0.0 {
            return Err(Error::Config(format!(
                "identification.scoring.vote_bonus must be a non-negative number, got {}",
                self.vote_bonus
            )));
        }
        if !self.average_factor.is_finite() || self.average_factor < 0.0 {
            return Err(Error::Config(format!(
                "identification.scoring.average_factor must be a non-negative number, got {}",
                self.average_factor
            )));
        }
        Ok(())
    }

    /// Score for one species aggregate
    ///
    /// `vote_count` of zero yields the weighted sum alone (no sources, no
    /// average), which never happens for a real aggregate.
    pub fn consensus_score(
        &self,
        weighted_confidence: f64,
        total_confidence: f64,
        vote_count: usize,
    ) -> f64 {
        if vote_count == 0 {
            return weighted_confidence;
        }
        let votes = vote_count as f64;
        weighted_confidence
            + votes * self.vote_bonus
            + self.average_factor * (total_confidence / votes)
    }
}

/// Clamp a consensus score to a 0-100 percentage
pub fn final_confidence(consensus_score: f64) -> u8 {
    consensus_score.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_source_score() {
        let params = ScoringParams::default();
        // 70 * 0.5 + 10 + 0.5 * 70
        let score = params.consensus_score(35.0, 70.0, 1);
        assert!((score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_source_score() {
        let params = ScoringParams::default();
        // 80*0.5 + 60*0.3 = 58; + 20; + 0.5 * 70
        let score = params.consensus_score(58.0, 140.0, 2);
        assert!((score - 113.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_params() {
        let params = ScoringParams {
            vote_bonus: 0.0,
            average_factor: 0.0,
        };
        assert_eq!(params.consensus_score(42.0, 84.0, 2), 42.0);
    }

    #[test]
    fn test_final_confidence_clamps_and_rounds() {
        assert_eq!(final_confidence(113.0), 100);
        assert_eq!(final_confidence(72.5), 73);
        assert_eq!(final_confidence(72.49), 72);
        assert_eq!(final_confidence(-3.0), 0);
    }

    #[test]
    fn test_validate_rejects_negative() {
        let params = ScoringParams {
            vote_bonus: -1.0,
            average_factor: 0.5,
        };
        assert!(params.validate().is_err());
        assert!(ScoringParams::default().validate().is_ok());
    }
}
