//! One verification attempt, end to end: read probe, match gallery, decide.

use crate::decider::{DecideError, Thresholds};
use crate::gallery::{GalleryError, GallerySource};
use crate::matcher::{GalleryMatcher, MatchError};
use crate::raw_image::{ImageError, RawImage};
use crate::scorer::PairScorer;
use crate::types::VerificationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// A failed attempt. Never the same thing as an "Unverified" result.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("probe unavailable: {0}")]
    Probe(#[from] ImageError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Decide(#[from] DecideError),
}

/// Coarse failure category reported alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Decode,
    NotFound,
    EmptyGallery,
    PairEvaluation,
    ModelLoad,
    InvalidInput,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Decode => "decode error",
            FailureKind::NotFound => "not found",
            FailureKind::EmptyGallery => "empty gallery",
            FailureKind::PairEvaluation => "pair evaluation error",
            FailureKind::ModelLoad => "model load error",
            FailureKind::InvalidInput => "invalid input",
            FailureKind::Io => "i/o error",
        })
    }
}

impl VerifyError {
    pub fn kind(&self) -> FailureKind {
        match self {
            VerifyError::Probe(ImageError::Decode(_)) => FailureKind::Decode,
            VerifyError::Probe(ImageError::NotFound(_)) => FailureKind::NotFound,
            VerifyError::Probe(ImageError::Io { .. }) => FailureKind::Io,
            VerifyError::Match(MatchError::EmptyGallery) => FailureKind::EmptyGallery,
            VerifyError::Match(MatchError::Gallery(GalleryError::NotFound(_))) => {
                FailureKind::NotFound
            }
            VerifyError::Match(MatchError::Gallery(GalleryError::Enumerate { .. })) => {
                FailureKind::Io
            }
            VerifyError::Match(MatchError::PairEvaluation { .. }) => FailureKind::PairEvaluation,
            VerifyError::Decide(_) => FailureKind::InvalidInput,
        }
    }
}

/// Owns the scorer for the lifetime of the process and runs attempts one at a time.
pub struct Verifier<S> {
    matcher: GalleryMatcher<S>,
    thresholds: Thresholds,
}

impl<S: PairScorer> Verifier<S> {
    pub fn new(scorer: S, thresholds: Thresholds) -> Result<Self, DecideError> {
        thresholds.validate()?;
        Ok(Self {
            matcher: GalleryMatcher::new(scorer),
            thresholds,
        })
    }

    pub fn scorer(&self) -> &S {
        self.matcher.scorer()
    }

    /// Verify the probe stored at `probe_path` against `gallery`.
    ///
    /// The probe is read at call time; nothing is cached between attempts.
    pub fn verify<G: GallerySource + ?Sized>(
        &mut self,
        probe_path: &Path,
        gallery: &G,
    ) -> Result<VerificationReport, VerifyError> {
        let attempt_id = Uuid::new_v4();
        let span = tracing::info_span!("verify", %attempt_id);
        let _enter = span.enter();

        let probe = RawImage::open(probe_path).map_err(|e| {
            tracing::warn!(probe = %probe_path.display(), error = %e, "probe unreadable");
            e
        })?;

        let mut report = self.run(attempt_id, &probe, gallery)?;
        report.probe = Some(probe_path.to_path_buf());
        Ok(report)
    }

    /// Verify an in-memory probe against `gallery`.
    pub fn verify_image<G: GallerySource + ?Sized>(
        &mut self,
        probe: &RawImage,
        gallery: &G,
    ) -> Result<VerificationReport, VerifyError> {
        let attempt_id = Uuid::new_v4();
        let span = tracing::info_span!("verify", %attempt_id);
        let _enter = span.enter();

        self.run(attempt_id, probe, gallery)
    }

    fn run<G: GallerySource + ?Sized>(
        &mut self,
        attempt_id: Uuid,
        probe: &RawImage,
        gallery: &G,
    ) -> Result<VerificationReport, VerifyError> {
        let matched = self.matcher.match_against_gallery(probe, gallery)?;
        let result = self.thresholds.decide(matched.scores)?;

        tracing::info!(
            scores = ?result.raw_scores().as_slice(),
            positive_count = result.positive_count(),
            positive_proportion = result.positive_proportion(),
            verified = result.is_verified(),
            "verification attempt complete"
        );

        Ok(VerificationReport {
            attempt_id,
            completed_at: chrono::Utc::now(),
            probe: None,
            references: matched.references,
            thresholds: self.thresholds,
            result,
        })
    }
}
