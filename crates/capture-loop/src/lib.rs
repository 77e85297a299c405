//! Capture Loop
//!
//! Runs frame acquisition and drowsiness analysis on a dedicated thread:
//! - Fixed-cadence polling with a frame-skip factor
//! - Bounded read timeout, exponential backoff and periodic reconnects
//! - Cooperative stop through a running flag
//! - Publication of every processed frame to the shared store

mod capture;
mod session;

pub use capture::{CaptureConfig, CaptureLoop, CaptureStats, StatsSnapshot, Step};
pub use session::{Session, SessionLauncher};

use camera_capture::CameraError;
use dms::DmsError;
use thiserror::Error;

/// Errors starting or stopping a session
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not initialize camera: {0}")]
    Camera(#[from] CameraError),
    #[error("Could not initialize detectors: {0}")]
    Dms(#[from] DmsError),
    #[error("Invalid capture configuration: {0}")]
    Config(String),
    #[error("Failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Capture thread panicked")]
    Panicked,
}
