//! Dual-threshold verification policy.
//!
//! Stage 1 counts gallery comparisons whose similarity is strictly above the
//! detection threshold. Stage 2 verifies when the proportion of such
//! positives is strictly above the verification threshold. Both comparisons
//! are strict: a value equal to its threshold does not pass.

use crate::types::{ScoreVector, VerificationResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.5;
pub const DEFAULT_VERIFICATION_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecideError {
    #[error("{name} threshold must be within [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
    #[error("cannot decide on an empty score vector")]
    EmptyScores,
}

/// Decision parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Per-pair similarity a comparison must exceed to count as positive.
    pub detection: f32,
    /// Proportion of positives that must be exceeded to verify.
    pub verification: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            detection: DEFAULT_DETECTION_THRESHOLD,
            verification: DEFAULT_VERIFICATION_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(detection: f32, verification: f32) -> Result<Self, DecideError> {
        let thresholds = Self {
            detection,
            verification,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), DecideError> {
        check_threshold("detection", self.detection)?;
        check_threshold("verification", self.verification)
    }

    /// [`decide`] with these thresholds.
    pub fn decide(&self, scores: ScoreVector) -> Result<VerificationResult, DecideError> {
        decide(scores, self.detection, self.verification)
    }
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), DecideError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DecideError::InvalidThreshold { name, value })
    }
}

/// Turn a score vector into a verdict.
pub fn decide(
    scores: ScoreVector,
    detection_threshold: f32,
    verification_threshold: f32,
) -> Result<VerificationResult, DecideError> {
    check_threshold("detection", detection_threshold)?;
    check_threshold("verification", verification_threshold)?;

    if scores.is_empty() {
        return Err(DecideError::EmptyScores);
    }

    let positive_count = scores.iter().filter(|&&s| s > detection_threshold).count();
    let positive_proportion = positive_count as f32 / scores.len() as f32;
    let verified = positive_proportion > verification_threshold;

    Ok(VerificationResult::new(
        scores,
        positive_count,
        positive_proportion,
        verified,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[f32]) -> ScoreVector {
        values.to_vec().into()
    }

    #[test]
    fn test_ties_at_detection_threshold_are_negative() {
        let result = decide(scores(&[0.5, 0.5, 0.5]), 0.5, 0.5).unwrap();
        assert_eq!(result.positive_count(), 0);
        assert_eq!(result.positive_proportion(), 0.0);
        assert!(!result.is_verified());
    }

    #[test]
    fn test_proportion_equal_to_threshold_is_unverified() {
        let result = decide(scores(&[0.9, 0.9, 0.1, 0.1]), 0.5, 0.5).unwrap();
        assert_eq!(result.positive_count(), 2);
        assert_eq!(result.positive_proportion(), 0.5);
        assert!(!result.is_verified());
    }

    #[test]
    fn test_majority_positive_is_verified() {
        let result = decide(scores(&[0.9, 0.9, 0.9, 0.1]), 0.5, 0.5).unwrap();
        assert_eq!(result.positive_count(), 3);
        assert_eq!(result.positive_proportion(), 0.75);
        assert!(result.is_verified());
    }

    #[test]
    fn test_raw_scores_returned_unchanged() {
        let input = scores(&[0.2, 0.8, 0.6]);
        let result = decide(input.clone(), 0.5, 0.5).unwrap();
        assert_eq!(result.raw_scores(), &input);
    }

    #[test]
    fn test_deterministic() {
        let input = scores(&[0.51, 0.49, 0.77, 0.5, 0.93]);
        let first = decide(input.clone(), 0.5, 0.4).unwrap();
        for _ in 0..10 {
            assert_eq!(decide(input.clone(), 0.5, 0.4).unwrap(), first);
        }
    }

    #[test]
    fn test_zero_verification_threshold_needs_one_positive() {
        let none = decide(scores(&[0.1, 0.2]), 0.5, 0.0).unwrap();
        assert!(!none.is_verified());
        let one = decide(scores(&[0.1, 0.6]), 0.5, 0.0).unwrap();
        assert!(one.is_verified());
    }

    #[test]
    fn test_full_verification_threshold_never_verifies() {
        let result = decide(scores(&[1.0, 1.0]), 0.0, 1.0).unwrap();
        assert_eq!(result.positive_proportion(), 1.0);
        assert!(!result.is_verified());
    }

    #[test]
    fn test_empty_scores_rejected() {
        assert_eq!(decide(ScoreVector::default(), 0.5, 0.5), Err(DecideError::EmptyScores));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(matches!(
            decide(scores(&[0.9]), 1.5, 0.5),
            Err(DecideError::InvalidThreshold { name: "detection", .. })
        ));
        assert!(matches!(
            decide(scores(&[0.9]), 0.5, f32::NAN),
            Err(DecideError::InvalidThreshold { name: "verification", .. })
        ));
        assert!(Thresholds::new(-0.1, 0.5).is_err());
    }

    #[test]
    fn test_thresholds_default_and_decide() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds, Thresholds::new(0.5, 0.5).unwrap());
        assert!(thresholds.decide(scores(&[0.9, 0.9, 0.9, 0.1])).unwrap().is_verified());
    }
}
