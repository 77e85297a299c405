//! Monitoring sessions: one capture thread per session

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use camera_capture::{open_with_fallback, CameraBackend, CameraConfig};
use dms::{DmsConfig, DrowsinessMonitor};
use frame_store::FrameStore;
use tracing::{info, warn};

use crate::capture::{CaptureConfig, CaptureLoop, CaptureStats};
use crate::PipelineError;

/// A running capture thread.
///
/// Dropping the session stops the thread and waits for it to release the
/// camera.
pub struct Session {
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    thread: Option<JoinHandle<()>>,
    started_at: Instant,
}

impl Session {
    /// Open the camera and spawn the capture thread.
    ///
    /// Nothing is left running when this fails.
    pub fn start(
        backend: &dyn CameraBackend,
        camera: &CameraConfig,
        monitor: DrowsinessMonitor,
        store: Arc<FrameStore>,
        config: CaptureConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let source = open_with_fallback(backend, camera)?;

        let capture = CaptureLoop::new(source, monitor, store, config);
        let running = capture.running_flag();
        let stats = capture.stats();
        running.store(true, Ordering::Release);

        let thread = thread::Builder::new()
            .name("capture-loop".into())
            .spawn(move || capture.run())
            .map_err(|e| {
                running.store(false, Ordering::Release);
                PipelineError::Spawn(e)
            })?;

        info!("Monitoring session started");
        Ok(Self {
            running,
            stats,
            thread: Some(thread),
            started_at: Instant::now(),
        })
    }

    /// Whether the capture thread is still looping
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Request a stop and wait for the thread to release the camera
    pub fn stop(mut self) -> Result<(), PipelineError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), PipelineError> {
        self.running.store(false, Ordering::Release);
        match self.thread.take() {
            Some(thread) => {
                thread.join().map_err(|_| PipelineError::Panicked)?;
                info!("Monitoring session stopped");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Session shutdown failed: {}", e);
        }
    }
}

/// Everything needed to start sessions on demand
pub struct SessionLauncher {
    backend: Arc<dyn CameraBackend>,
    camera: CameraConfig,
    capture: CaptureConfig,
    dms: DmsConfig,
}

impl SessionLauncher {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        camera: CameraConfig,
        capture: CaptureConfig,
        dms: DmsConfig,
    ) -> Self {
        Self {
            backend,
            camera,
            capture,
            dms,
        }
    }

    /// Load detectors, open the camera and start capturing into `store`
    /// Load the configured models once so a bad path fails at startup
    pub fn preflight(&self) -> Result<(), PipelineError> {
        DrowsinessMonitor::new(&self.dms)?;
        Ok(())
    }

    pub fn launch(&self, store: Arc<FrameStore>) -> Result<Session, PipelineError> {
        let monitor = DrowsinessMonitor::new(&self.dms)?;
        Session::start(self.backend.as_ref(), &self.camera, monitor, store, self.capture.clone())
    }
}
