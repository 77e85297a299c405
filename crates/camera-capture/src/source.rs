//! Frame sources and device selection

use std::time::Duration;

use tracing::{info, warn};

use crate::{CameraConfig, CameraError, VideoFrame};

/// A stream of frames owned by the capture loop.
pub trait FrameSource: Send {
    /// Read the next frame, waiting at most `timeout`.
    fn read_frame(&mut self, timeout: Duration) -> Result<VideoFrame, CameraError>;

    /// Re-establish the underlying stream after repeated read failures.
    fn reconnect(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    /// Release the device handle. Called once after the capture loop exits.
    fn release(&mut self) {}

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Opens frame sources by device index.
pub trait CameraBackend: Send + Sync {
    fn open(&self, index: u32, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError>;
}

/// Open the primary device, falling back to the secondary index.
///
/// Returns the last open error when no candidate can be opened.
pub fn open_with_fallback(
    backend: &dyn CameraBackend,
    config: &CameraConfig,
) -> Result<Box<dyn FrameSource>, CameraError> {
    let mut last_error = CameraError::NotInitialized;

    for index in config.candidate_indices() {
        match backend.open(index, config) {
            Ok(source) => {
                info!("Camera initialized on index {} ({})", index, source.describe());
                return Ok(source);
            }
            Err(e) => {
                warn!("Failed to initialize camera on index {}: {}", index, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}
