//! Frame sources and the probe-producing capture session.
//!
//! Camera drivers live outside this crate: a helper process keeps writing the
//! newest frame to an image file, and [`FileFrameSource`] reads it on demand.

use crate::frame::{self, CaptureRegion, Frame, FrameError};
use faceid_core::ImageError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame source not found: {0}")]
    SourceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("frame {sequence} is too dark to use as a probe")]
    DarkFrame { sequence: u32 },
    #[error("failed to persist probe to {path}: {reason}")]
    Persist { path: String, reason: String },
}

/// Anything that can hand over "the current frame".
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Reads the newest frame from an image file on every call.
pub struct FileFrameSource {
    path: PathBuf,
    sequence: u32,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sequence: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FileFrameSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.path.exists() {
            return Err(CaptureError::SourceNotFound(self.path.display().to_string()));
        }

        let decoded = image::open(&self.path).map_err(|e| {
            CaptureError::CaptureFailed(format!("failed to read frame {}: {e}", self.path.display()))
        })?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        self.sequence = self.sequence.wrapping_add(1);

        Ok(Frame {
            data: frame::rgb_to_bgr(rgb.as_raw()),
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: self.sequence,
        })
    }
}

/// Crops frames to the face region and persists probes for verification.
pub struct CaptureSession<F> {
    source: F,
    region: CaptureRegion,
    probe_path: PathBuf,
    dark_ratio: f32,
}

impl<F: FrameSource> CaptureSession<F> {
    pub fn new(source: F, region: CaptureRegion, probe_path: impl Into<PathBuf>, dark_ratio: f32) -> Self {
        Self {
            source,
            region,
            probe_path: probe_path.into(),
            dark_ratio,
        }
    }

    pub fn probe_path(&self) -> &Path {
        &self.probe_path
    }

    /// The current frame cropped to the capture region, without persisting it.
    pub fn preview(&mut self) -> Result<Frame, CaptureError> {
        let frame = self.source.next_frame()?;
        Ok(frame::crop(&frame, self.region)?)
    }

    /// Crop the current frame and write it to the probe location.
    ///
    /// Dark frames are rejected and leave any previous probe untouched.
    pub fn capture_probe(&mut self) -> Result<PathBuf, CaptureError> {
        let frame = self.preview()?;

        if frame::is_dark_frame(&frame.luma(), self.dark_ratio) {
            tracing::debug!(seq = frame.sequence, "rejecting dark frame");
            return Err(CaptureError::DarkFrame {
                sequence: frame.sequence,
            });
        }

        persist_probe(&frame, &self.probe_path)?;

        tracing::info!(
            path = %self.probe_path.display(),
            seq = frame.sequence,
            width = frame.width,
            height = frame.height,
            "probe captured"
        );

        Ok(self.probe_path.clone())
    }
}

fn persist_probe(frame: &Frame, path: &Path) -> Result<(), CaptureError> {
    let persist_err = |reason: String| CaptureError::Persist {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
    }

    frame
        .to_raw_image()?
        .to_rgb_image()
        .save(path)
        .map_err(|e| persist_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceid_core::RawImage;
    use image::{Rgb, RgbImage};

    /// Replays a fixed frame.
    struct StillSource(Frame);

    impl FrameSource for StillSource {
        fn next_frame(&mut self) -> Result<Frame, CaptureError> {
            Ok(self.0.clone())
        }
    }

    fn uniform_frame(width: u32, height: u32, bgr: [u8; 3]) -> Frame {
        Frame {
            data: bgr.repeat((width * height) as usize),
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: 1,
        }
    }

    fn default_region() -> CaptureRegion {
        CaptureRegion { x: 200, y: 120, width: 250, height: 250 }
    }

    #[test]
    fn test_file_source_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileFrameSource::new(dir.path().join("frame.jpg"));
        assert!(matches!(source.next_frame(), Err(CaptureError::SourceNotFound(_))));
    }

    #[test]
    fn test_file_source_reads_bgr_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(8, 6, Rgb([10, 20, 30])).save(&path).unwrap();

        let mut source = FileFrameSource::new(&path);
        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();

        assert_eq!((first.width, first.height), (8, 6));
        assert_eq!(&first.data[..3], &[30, 20, 10]);
        assert_eq!(second.sequence, first.sequence + 1);
    }

    #[test]
    fn test_file_source_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        let mut source = FileFrameSource::new(&path);
        assert!(matches!(source.next_frame(), Err(CaptureError::CaptureFailed(_))));
    }

    #[test]
    fn test_preview_crops_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let probe = dir.path().join("input_image").join("input_image.png");
        let mut session = CaptureSession::new(
            StillSource(uniform_frame(640, 480, [90, 90, 90])),
            default_region(),
            &probe,
            0.95,
        );

        let preview = session.preview().unwrap();
        assert_eq!((preview.width, preview.height), (250, 250));
        assert!(!probe.exists());
    }

    #[test]
    fn test_capture_probe_persists_crop() {
        let dir = tempfile::tempdir().unwrap();
        let probe = dir.path().join("input_image").join("input_image.png");
        let mut session = CaptureSession::new(
            StillSource(uniform_frame(640, 480, [40, 90, 200])),
            default_region(),
            &probe,
            0.95,
        );

        let written = session.capture_probe().unwrap();
        assert_eq!(written, probe);

        let stored = RawImage::open(&probe).unwrap();
        assert_eq!((stored.width(), stored.height()), (250, 250));
        assert_eq!(stored.pixel_rgb(0, 0), [200, 90, 40]);
    }

    #[test]
    fn test_capture_probe_rejects_dark_frame() {
        let dir = tempfile::tempdir().unwrap();
        let probe = dir.path().join("input_image.png");
        let mut session = CaptureSession::new(
            StillSource(uniform_frame(640, 480, [2, 2, 2])),
            default_region(),
            &probe,
            0.95,
        );

        assert!(matches!(
            session.capture_probe(),
            Err(CaptureError::DarkFrame { .. })
        ));
        assert!(!probe.exists());
    }

    #[test]
    fn test_capture_probe_small_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = CaptureSession::new(
            StillSource(uniform_frame(320, 240, [90, 90, 90])),
            default_region(),
            dir.path().join("input_image.png"),
            0.95,
        );
        assert!(matches!(
            session.capture_probe(),
            Err(CaptureError::Frame(FrameError::RegionOutOfBounds { .. }))
        ));
    }
}
