//! faceid-capture: Capture-side collaborator for face verification.
//!
//! Turns camera frames into probes: crops the fixed face region, rejects
//! dark frames, and persists the probe where the verification core reads it.

pub mod frame;
pub mod session;

pub use frame::{CaptureRegion, Frame, FrameError};
pub use session::{CaptureError, CaptureSession, FileFrameSource, FrameSource};
