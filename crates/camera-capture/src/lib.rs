//! Camera Capture Library for Driver Monitoring
//!
//! Provides the frame acquisition side of the drowsiness pipeline:
//! - Decoded RGB video frames with validation, cropping and JPEG encoding
//! - A `FrameSource` abstraction polled by the capture loop
//! - Primary/fallback device selection through a `CameraBackend`
//! - A synthetic test-pattern camera for running without hardware

pub mod frame;
pub mod source;
pub mod synthetic;

pub use frame::VideoFrame;
pub use source::{open_with_fallback, CameraBackend, FrameSource};
pub use synthetic::{SyntheticBackend, SyntheticCamera};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("Camera disconnected")]
    Disconnected,

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Primary device index
    pub index: u32,
    /// Device index tried when the primary cannot be opened
    pub fallback_index: u32,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            fallback_index: 1,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl CameraConfig {
    /// Device indices in the order they should be tried
    pub fn candidate_indices(&self) -> Vec<u32> {
        if self.index == self.fallback_index {
            vec![self.index]
        } else {
            vec![self.index, self.fallback_index]
        }
    }
}
