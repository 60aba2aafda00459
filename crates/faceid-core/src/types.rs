use crate::decider::Thresholds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Raw similarities, one per gallery reference, in gallery enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f32> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

impl FromIterator<f32> for ScoreVector {
    fn from_iter<I: IntoIterator<Item = f32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of the dual-threshold decision for one attempt.
///
/// Only [`decide`](crate::decider::decide) builds these; fields are read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    raw_scores: ScoreVector,
    positive_count: usize,
    positive_proportion: f32,
    verified: bool,
}

impl VerificationResult {
    pub(crate) fn new(
        raw_scores: ScoreVector,
        positive_count: usize,
        positive_proportion: f32,
        verified: bool,
    ) -> Self {
        Self {
            raw_scores,
            positive_count,
            positive_proportion,
            verified,
        }
    }

    pub fn raw_scores(&self) -> &ScoreVector {
        &self.raw_scores
    }

    /// Scores strictly above the detection threshold.
    pub fn positive_count(&self) -> usize {
        self.positive_count
    }

    /// `positive_count / raw_scores.len()`, in [0, 1].
    pub fn positive_proportion(&self) -> f32 {
        self.positive_proportion
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// User-facing verdict text.
    pub fn label(&self) -> &'static str {
        if self.verified {
            "Verified"
        } else {
            "Unverified"
        }
    }
}

/// Caller-facing record of one completed verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub attempt_id: Uuid,
    pub completed_at: DateTime<Utc>,
    /// Probe file, when the probe was read from disk.
    pub probe: Option<PathBuf>,
    /// Reference names, aligned index-for-index with `result.raw_scores()`.
    pub references: Vec<String>,
    pub thresholds: Thresholds,
    pub result: VerificationResult,
}
