//! Probe-versus-gallery scoring.

use crate::gallery::{GalleryError, GallerySource, ImageHandle};
use crate::normalizer::{normalize, NormalizedTensor};
use crate::raw_image::{ImageError, RawImage};
use crate::scorer::{PairScorer, ScorerError};
use crate::types::ScoreVector;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("gallery is empty: no reference images enrolled")]
    EmptyGallery,
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error("failed to evaluate probe against reference {reference}: {source}")]
    PairEvaluation {
        reference: String,
        #[source]
        source: PairFailure,
    },
}

/// Why a single (probe, reference) comparison failed.
#[derive(Error, Debug)]
pub enum PairFailure {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Scorer(#[from] ScorerError),
}

/// Scores of one gallery pass, with the reference each score belongs to.
#[derive(Debug, Clone)]
pub struct GalleryScores {
    /// Reference names in enumeration order.
    pub references: Vec<String>,
    pub scores: ScoreVector,
}

/// Scores a probe against every reference in a gallery with an injected scorer.
pub struct GalleryMatcher<S> {
    scorer: S,
}

impl<S: PairScorer> GalleryMatcher<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// One score per reference, in the gallery's enumeration order.
    ///
    /// The probe is normalized once and reused for every pair. The first
    /// reference that cannot be read, normalized or scored aborts the whole
    /// pass; no partial vector is returned.
    pub fn match_against_gallery<G: GallerySource + ?Sized>(
        &mut self,
        probe: &RawImage,
        gallery: &G,
    ) -> Result<GalleryScores, MatchError> {
        let handles = gallery.list_images()?;
        if handles.is_empty() {
            return Err(MatchError::EmptyGallery);
        }

        let probe_tensor = normalize(probe);

        let mut references = Vec::with_capacity(handles.len());
        let mut scores = Vec::with_capacity(handles.len());

        for handle in &handles {
            let score = self
                .score_reference(&probe_tensor, gallery, handle)
                .map_err(|source| {
                    tracing::warn!(reference = handle.name(), error = %source, "pair evaluation failed");
                    MatchError::PairEvaluation {
                        reference: handle.name().to_string(),
                        source,
                    }
                })?;

            tracing::debug!(reference = handle.name(), score, "scored reference");
            references.push(handle.name().to_string());
            scores.push(score);
        }

        Ok(GalleryScores {
            references,
            scores: scores.into(),
        })
    }

    fn score_reference<G: GallerySource + ?Sized>(
        &mut self,
        probe: &NormalizedTensor,
        gallery: &G,
        handle: &ImageHandle,
    ) -> Result<f32, PairFailure> {
        let reference = gallery.read_image(handle)?;
        let reference = normalize(&reference);
        Ok(self.scorer.score(probe, &reference)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::raw_image::ChannelOrder;
    use crate::scorer::testing::{FlakyScorer, MeanScorer};
    use std::collections::BTreeMap;

    /// In-memory gallery; `None` entries fail to decode.
    #[derive(Default)]
    pub(crate) struct MemoryGallery {
        pub images: BTreeMap<String, Option<RawImage>>,
    }

    impl MemoryGallery {
        pub fn with_gray(values: &[(&str, u8)]) -> Self {
            let images = values
                .iter()
                .map(|&(name, v)| (name.to_string(), Some(gray(v))))
                .collect();
            Self { images }
        }
    }

    impl GallerySource for MemoryGallery {
        fn list_images(&self) -> Result<Vec<ImageHandle>, GalleryError> {
            Ok(self
                .images
                .keys()
                .map(|name| ImageHandle::new(name.clone(), name.clone()))
                .collect())
        }

        fn read_image(&self, handle: &ImageHandle) -> Result<RawImage, ImageError> {
            match self.images.get(handle.name()) {
                Some(Some(image)) => Ok(image.clone()),
                Some(None) => Err(ImageError::Decode(format!("{} is corrupt", handle.name()))),
                None => Err(ImageError::NotFound(handle.name().to_string())),
            }
        }
    }

    pub(crate) fn gray(value: u8) -> RawImage {
        RawImage::new(12, 9, ChannelOrder::Bgr, vec![value; 12 * 9 * 3]).unwrap()
    }

    #[test]
    fn test_empty_gallery_is_an_error() {
        let mut matcher = GalleryMatcher::new(MeanScorer::default());
        let result = matcher.match_against_gallery(&gray(100), &MemoryGallery::default());
        assert!(matches!(result, Err(MatchError::EmptyGallery)));
        assert!(matcher.scorer().probe_means.is_empty());
    }

    #[test]
    fn test_scores_follow_enumeration_order() {
        let gallery = MemoryGallery::with_gray(&[("a", 255), ("b", 0), ("c", 51)]);
        let mut matcher = GalleryMatcher::new(MeanScorer::default());

        let result = matcher.match_against_gallery(&gray(100), &gallery).unwrap();

        assert_eq!(result.references, ["a", "b", "c"]);
        let scores = result.scores.as_slice();
        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 1.0).abs() < 1e-5);
        assert!(scores[1].abs() < 1e-5);
        assert!((scores[2] - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_probe_normalized_once_and_reused() {
        let gallery = MemoryGallery::with_gray(&[("a", 10), ("b", 20), ("c", 30), ("d", 40)]);
        let mut matcher = GalleryMatcher::new(MeanScorer::default());

        matcher.match_against_gallery(&gray(204), &gallery).unwrap();

        let seen = &matcher.scorer().probe_means;
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|&m| (m - 0.8).abs() < 1e-5));
    }

    #[test]
    fn test_undecodable_reference_fails_whole_pass() {
        let mut gallery = MemoryGallery::with_gray(&[("a", 200), ("c", 200)]);
        gallery.images.insert("b".into(), None);
        let mut matcher = GalleryMatcher::new(MeanScorer::default());

        let err = matcher.match_against_gallery(&gray(100), &gallery).unwrap_err();

        match err {
            MatchError::PairEvaluation { reference, source } => {
                assert_eq!(reference, "b");
                assert!(matches!(source, PairFailure::Image(ImageError::Decode(_))));
            }
            other => panic!("expected PairEvaluation, got {other}"),
        }
        // Scoring stopped at the failing reference.
        assert_eq!(matcher.scorer().probe_means.len(), 1);
    }

    #[test]
    fn test_scorer_failure_names_reference() {
        let gallery = MemoryGallery::with_gray(&[("first", 1), ("second", 2), ("third", 3)]);
        let mut matcher = GalleryMatcher::new(FlakyScorer {
            score: 0.9,
            fail_at: 2,
            calls: 0,
        });

        let err = matcher.match_against_gallery(&gray(100), &gallery).unwrap_err();

        match err {
            MatchError::PairEvaluation { reference, source } => {
                assert_eq!(reference, "third");
                assert!(matches!(source, PairFailure::Scorer(_)));
            }
            other => panic!("expected PairEvaluation, got {other}"),
        }
    }

    #[test]
    fn test_boxed_scorer() {
        let gallery = MemoryGallery::with_gray(&[("only", 255)]);
        let scorer: Box<dyn PairScorer> = Box::new(MeanScorer::default());
        let mut matcher = GalleryMatcher::new(scorer);
        let result = matcher.match_against_gallery(&gray(0), &gallery).unwrap();
        assert_eq!(result.scores.len(), 1);
    }
}
