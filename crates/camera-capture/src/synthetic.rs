//! Synthetic test-pattern camera
//!
//! Generates a moving gradient so the pipeline and HTTP surface can run on
//! machines without a capture device.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::{CameraBackend, CameraConfig, CameraError, FrameSource, VideoFrame};

/// Frame source producing a scrolling RGB gradient
pub struct SyntheticCamera {
    index: u32,
    width: u32,
    height: u32,
    sequence: u32,
    started: Instant,
    released: bool,
}

impl SyntheticCamera {
    pub fn new(index: u32, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            sequence: 0,
            started: Instant::now(),
            released: false,
        }
    }

    fn render(&self) -> Vec<u8> {
        let offset = self.sequence as usize;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                data.push(((x + offset) % 256) as u8);
                data.push(((y + offset / 2) % 256) as u8);
                data.push(128);
            }
        }
        data
    }
}

impl FrameSource for SyntheticCamera {
    fn read_frame(&mut self, _timeout: Duration) -> Result<VideoFrame, CameraError> {
        if self.released {
            return Err(CameraError::NotInitialized);
        }
        let frame = VideoFrame::new(
            self.render(),
            self.width,
            self.height,
            self.started.elapsed().as_nanos() as u64,
            self.sequence,
        );
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn reconnect(&mut self) -> Result<(), CameraError> {
        debug!("Synthetic camera {} reconnect", self.index);
        self.released = false;
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn describe(&self) -> String {
        format!("synthetic:{} {}x{}", self.index, self.width, self.height)
    }
}

/// Backend exposing synthetic cameras on a fixed set of indices
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    devices: Vec<u32>,
}

impl SyntheticBackend {
    pub fn new(devices: Vec<u32>) -> Self {
        Self { devices }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(vec![0])
    }
}

impl CameraBackend for SyntheticBackend {
    fn open(&self, index: u32, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
        if !self.devices.contains(&index) {
            return Err(CameraError::Open(format!("no synthetic device at index {}", index)));
        }
        if config.width == 0 || config.height == 0 {
            return Err(CameraError::Format(format!(
                "unsupported resolution {}x{}",
                config.width, config.height
            )));
        }
        Ok(Box::new(SyntheticCamera::new(index, config.width, config.height)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_valid_and_sequenced() {
        let mut cam = SyntheticCamera::new(0, 32, 24);
        let a = cam.read_frame(Duration::from_millis(10)).unwrap();
        let b = cam.read_frame(Duration::from_millis(10)).unwrap();
        assert!(a.is_valid());
        assert_eq!(a.sequence + 1, b.sequence);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_released_camera_stops_reading() {
        let mut cam = SyntheticCamera::new(0, 4, 4);
        cam.release();
        assert_eq!(cam.read_frame(Duration::ZERO), Err(CameraError::NotInitialized));
    }

    #[test]
    fn test_backend_rejects_unknown_index() {
        let backend = SyntheticBackend::default();
        assert!(backend.open(3, &CameraConfig::default()).is_err());
        assert!(backend.open(0, &CameraConfig::default()).is_ok());
    }
}
