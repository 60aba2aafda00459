//! faceid-core: One-shot face verification engine.
//!
//! Normalizes a probe and each enrolled reference to 105x105 RGB tensors,
//! scores every (probe, reference) pair with a siamese network via ONNX
//! Runtime, and turns the scores into a verdict with a dual-threshold policy.

pub mod config;
pub mod decider;
pub mod gallery;
pub mod matcher;
pub mod normalizer;
pub mod raw_image;
pub mod scorer;
pub mod types;
pub mod verifier;

pub use config::{default_data_dir, CaptureSettings, Config, ConfigError};
pub use decider::{decide, DecideError, Thresholds};
pub use gallery::{DirectoryGallery, GalleryError, GallerySource, ImageHandle};
pub use matcher::{GalleryMatcher, GalleryScores, MatchError, PairFailure};
pub use normalizer::{normalize, NormalizedTensor};
pub use raw_image::{ChannelOrder, ImageError, RawImage};
pub use scorer::{ModelInfo, OnnxPairScorer, PairScorer, ScorerError};
pub use types::{ScoreVector, VerificationReport, VerificationResult};
pub use verifier::{FailureKind, Verifier, VerifyError};
