use crate::engine::{EngineError, EngineHandle};
use faceid_core::{ModelInfo, Thresholds, VerificationReport};
use std::path::PathBuf;
use zbus::interface;

/// D-Bus interface for the faceid verification daemon.
///
/// Bus name: org.freedesktop.FaceId1
/// Object path: /org/freedesktop/FaceId1
pub struct FaceIdService {
    pub engine: EngineHandle,
    pub model: ModelInfo,
    pub gallery_dir: PathBuf,
    pub probe_path: PathBuf,
    pub thresholds: Thresholds,
}

fn failed(err: EngineError) -> zbus::fdo::Error {
    match err.kind() {
        Some(kind) => zbus::fdo::Error::Failed(format!("{kind}: {err}")),
        None => zbus::fdo::Error::Failed(err.to_string()),
    }
}

fn report_json(report: &VerificationReport) -> zbus::fdo::Result<String> {
    serde_json::to_string(report).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

#[interface(name = "org.freedesktop.FaceId1")]
impl FaceIdService {
    /// Capture a fresh probe and verify it. Returns the report as JSON.
    async fn verify(&self) -> zbus::fdo::Result<String> {
        tracing::info!("verify requested");
        let report = self.engine.verify(true).await.map_err(failed)?;
        report_json(&report)
    }

    /// Verify the probe already on disk without capturing.
    async fn verify_probe(&self) -> zbus::fdo::Result<String> {
        tracing::info!(probe = %self.probe_path.display(), "verify_probe requested");
        let report = self.engine.verify(false).await.map_err(failed)?;
        report_json(&report)
    }

    /// Capture and persist a probe. Returns its path.
    async fn capture(&self) -> zbus::fdo::Result<String> {
        tracing::info!("capture requested");
        let path = self.engine.capture().await.map_err(failed)?;
        Ok(path.display().to_string())
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "model_path": self.model.path,
            "model_sha256": self.model.sha256,
            "gallery_dir": self.gallery_dir.display().to_string(),
            "probe_path": self.probe_path.display().to_string(),
            "detection_threshold": self.thresholds.detection,
            "verification_threshold": self.thresholds.verification,
        })
        .to_string())
    }
}
