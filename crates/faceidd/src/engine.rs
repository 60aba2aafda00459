use faceid_capture::{CaptureError, CaptureRegion, CaptureSession, FileFrameSource, FrameSource};
use faceid_core::{
    Config, DirectoryGallery, FailureKind, ModelInfo, OnnxPairScorer, PairScorer, ScorerError,
    VerificationReport, Verifier, VerifyError,
};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("scorer error: {0}")]
    Scorer(#[from] ScorerError),
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("invalid thresholds: {0}")]
    Thresholds(#[from] faceid_core::DecideError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

impl EngineError {
    /// Failure category for attempt errors, `None` for infrastructure errors.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            EngineError::Verify(e) => Some(e.kind()),
            EngineError::Scorer(e) if e.is_load_failure() => Some(FailureKind::ModelLoad),
            _ => None,
        }
    }
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Verify {
        capture: bool,
        reply: oneshot::Sender<Result<VerificationReport, EngineError>>,
    },
    Capture {
        reply: oneshot::Sender<Result<PathBuf, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request verification. With `capture` set, a fresh probe is captured first;
    /// otherwise the probe already on disk is used.
    pub async fn verify(&self, capture: bool) -> Result<VerificationReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Verify {
                capture,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request a probe capture without verifying it.
    pub async fn capture(&self) -> Result<PathBuf, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Capture { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Load the siamese model and spawn the engine on a dedicated OS thread.
///
/// Fails fast at startup if the model cannot be loaded. Returns the handle
/// together with the loaded model's identity for status reporting.
pub fn spawn_engine(config: &Config) -> Result<(EngineHandle, ModelInfo), EngineError> {
    let scorer = OnnxPairScorer::load(&config.model_path, config.scorer_threads)?;
    let info = scorer.info().clone();
    tracing::info!(
        path = %info.path,
        sha256 = %info.sha256,
        "siamese scorer loaded"
    );

    let verifier = Verifier::new(scorer, config.thresholds)?;
    let gallery = DirectoryGallery::new(&config.gallery_dir);
    let session = CaptureSession::new(
        FileFrameSource::new(&config.capture.frame_path),
        CaptureRegion::from(&config.capture),
        &config.probe_path,
        config.capture.dark_ratio,
    );

    let handle = spawn_with(Engine {
        verifier,
        gallery,
        session,
    })?;
    Ok((handle, info))
}

/// Everything the engine thread owns.
struct Engine<S, F> {
    verifier: Verifier<S>,
    gallery: DirectoryGallery,
    session: CaptureSession<F>,
}

impl<S: PairScorer, F: FrameSource> Engine<S, F> {
    fn verify(&mut self, capture: bool) -> Result<VerificationReport, EngineError> {
        if capture {
            self.session.capture_probe()?;
        }
        let probe_path = self.session.probe_path().to_path_buf();
        Ok(self.verifier.verify(&probe_path, &self.gallery)?)
    }

    fn capture(&mut self) -> Result<PathBuf, EngineError> {
        Ok(self.session.capture_probe()?)
    }
}

fn spawn_with<S, F>(mut engine: Engine<S, F>) -> Result<EngineHandle, EngineError>
where
    S: PairScorer + Send + 'static,
    F: FrameSource + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("faceid-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Verify { capture, reply } => {
                        let result = engine.verify(capture);
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, "verification attempt failed");
                        }
                        let _ = reply.send(result);
                    }
                    EngineRequest::Capture { reply } => {
                        let _ = reply.send(engine.capture());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}
