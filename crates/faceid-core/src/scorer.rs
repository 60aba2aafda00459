//! Pair scoring: the siamese similarity model behind a narrow trait.
//!
//! The model is an opaque artifact. The core only relies on the contract
//! "two normalized images in, one similarity in [0, 1] out".

use crate::normalizer::NormalizedTensor;
use ndarray::Axis;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

/// The siamese model takes a probe image and a reference image.
const SIAMESE_INPUTS: usize = 2;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("model file not found: {0} (export the siamese network to ONNX and place it there)")]
    ModelNotFound(String),
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("incompatible model {path}: {reason}")]
    Incompatible { path: String, reason: String },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("similarity {0} is outside [0, 1]")]
    OutOfRange(f32),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl ScorerError {
    /// True for errors raised while constructing a scorer; these are fatal
    /// to the verification subsystem.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::ModelNotFound(_) | Self::ModelLoad { .. } | Self::Incompatible { .. }
        )
    }
}

/// Similarity between a probe and a single reference.
///
/// Callers always pass `(probe, reference)` in that order and must not
/// assume `score(a, b) == score(b, a)`.
pub trait PairScorer {
    fn score(
        &mut self,
        probe: &NormalizedTensor,
        reference: &NormalizedTensor,
    ) -> Result<f32, ScorerError>;
}

impl<S: PairScorer + ?Sized> PairScorer for Box<S> {
    fn score(
        &mut self,
        probe: &NormalizedTensor,
        reference: &NormalizedTensor,
    ) -> Result<f32, ScorerError> {
        (**self).score(probe, reference)
    }
}

/// Identity of the loaded model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub path: String,
    /// Hex SHA-256 of the artifact bytes; doubles as the model version.
    pub sha256: String,
    pub inputs: Vec<String>,
}

/// Siamese network scorer via ONNX Runtime.
///
/// Inputs are two `[1, 105, 105, 3]` float tensors (NHWC); the first output
/// holds a single sigmoid similarity.
pub struct OnnxPairScorer {
    session: Session,
    info: ModelInfo,
}

fn load_failure(path: &Path, err: impl std::fmt::Display) -> ScorerError {
    ScorerError::ModelLoad {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

impl OnnxPairScorer {
    /// Load the siamese ONNX model. Called once per process.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, ScorerError> {
        if !model_path.exists() {
            return Err(ScorerError::ModelNotFound(model_path.display().to_string()));
        }

        let bytes = std::fs::read(model_path).map_err(|e| load_failure(model_path, e))?;
        let sha256 = digest_hex(&bytes);

        let session = Session::builder()
            .map_err(|e| load_failure(model_path, e))?
            .with_intra_threads(intra_threads)
            .map_err(|e| load_failure(model_path, e))?
            .commit_from_memory(&bytes)
            .map_err(|e| load_failure(model_path, e))?;

        let inputs: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        let outputs: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        if inputs.len() != SIAMESE_INPUTS {
            return Err(ScorerError::Incompatible {
                path: model_path.display().to_string(),
                reason: format!("expected {SIAMESE_INPUTS} inputs, got {}", inputs.len()),
            });
        }
        if outputs.is_empty() {
            return Err(ScorerError::Incompatible {
                path: model_path.display().to_string(),
                reason: "model has no outputs".into(),
            });
        }

        tracing::info!(
            path = %model_path.display(),
            sha256 = %sha256,
            inputs = ?inputs,
            outputs = ?outputs,
            "loaded siamese model"
        );

        Ok(Self {
            session,
            info: ModelInfo {
                path: model_path.display().to_string(),
                sha256,
                inputs,
            },
        })
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }
}

impl PairScorer for OnnxPairScorer {
    fn score(
        &mut self,
        probe: &NormalizedTensor,
        reference: &NormalizedTensor,
    ) -> Result<f32, ScorerError> {
        let probe_batch = probe.view().insert_axis(Axis(0));
        let reference_batch = reference.view().insert_axis(Axis(0));

        let outputs = self.session.run(ort::inputs![
            TensorRef::from_array_view(probe_batch)?,
            TensorRef::from_array_view(reference_batch)?
        ])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ScorerError::InferenceFailed(format!("similarity extraction: {e}")))?;

        let [similarity] = raw else {
            return Err(ScorerError::InferenceFailed(format!(
                "expected a single similarity, got {} values",
                raw.len()
            )));
        };

        check_similarity(*similarity)
    }
}

/// Reject similarities the contract does not allow (NaN, infinities, outside [0, 1]).
pub fn check_similarity(value: f32) -> Result<f32, ScorerError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ScorerError::OutOfRange(value))
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
