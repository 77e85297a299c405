//! Capture Loop Implementation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use camera_capture::{CameraError, FrameSource};
use dms::DrowsinessMonitor;
use frame_store::FrameStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::PipelineError;

/// Longest single sleep while waiting, so a stop request is noticed promptly
const STOP_POLL: Duration = Duration::from_millis(50);

/// Configuration for the capture loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Process every Nth successfully read frame (default: 1)
    pub frame_skip: u32,
    /// Pause between loop iterations in milliseconds (~30 fps)
    pub frame_interval_ms: u64,
    /// Maximum wait for a single frame read
    pub read_timeout_ms: u64,
    /// Consecutive read failures before reporting the source as failing
    pub max_retries: u32,
    /// Retry backoff base in milliseconds
    pub retry_backoff_ms: u64,
    /// Upper bound for the exponential backoff
    pub max_backoff_ms: u64,
    /// Consecutive read failures between reconnect attempts
    pub reconnect_after: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_skip: 1,
            frame_interval_ms: 33,
            read_timeout_ms: 1000,
            max_retries: 5,
            retry_backoff_ms: 100,
            max_backoff_ms: 2000,
            reconnect_after: 10,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.frame_skip == 0 {
            return Err(PipelineError::Config("frame_skip must be at least 1".into()));
        }
        if self.reconnect_after == 0 {
            return Err(PipelineError::Config("reconnect_after must be at least 1".into()));
        }
        if self.read_timeout_ms == 0 {
            return Err(PipelineError::Config("read_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Backoff after `failures` consecutive failed reads
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let delay = self.retry_backoff_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Counters shared between the loop and observers
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames_captured: AtomicU64,
    frames_processed: AtomicU64,
    drowsy_frames: AtomicU64,
    read_failures: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_processed: u64,
    pub drowsy_frames: u64,
    pub read_failures: u64,
    pub reconnects: u64,
}

impl CaptureStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            drowsy_frames: self.drowsy_frames.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Frame analyzed and published
    Processed,
    /// Frame read but skipped by the frame-skip factor
    Skipped,
    /// Read failed; wait this long before the next attempt
    ReadFailed { backoff: Duration },
}

/// Capture-and-process loop.
///
/// Sole owner of the frame source and the drowsiness monitor, and the only
/// writer to the frame store.
pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    monitor: DrowsinessMonitor,
    store: Arc<FrameStore>,
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    frame_count: u64,
    consecutive_failures: u32,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        monitor: DrowsinessMonitor,
        store: Arc<FrameStore>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            source,
            monitor,
            store,
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(CaptureStats::default()),
            frame_count: 0,
            consecutive_failures: 0,
        }
    }

    /// Flag checked once per iteration; clearing it stops the loop
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    /// Run the loop until the running flag is cleared, then release the
    /// frame source.
    ///
    /// The flag must already be set; `Session::start` sets it before
    /// spawning so a stop issued immediately after start is not lost.
    pub fn run(mut self) {
        info!("Starting video capture from {}", self.source.describe());

        while self.running.load(Ordering::Acquire) {
            let wait = match self.step() {
                Step::Processed | Step::Skipped => {
                    Duration::from_millis(self.config.frame_interval_ms)
                }
                Step::ReadFailed { backoff } => backoff,
            };
            self.sleep_while_running(wait);
        }

        info!("Cleaning up video capture...");
        self.source.release();
        info!(
            frames_processed = self.stats.frames_processed.load(Ordering::Relaxed),
            "Video capture stopped"
        );
    }

    /// One iteration: read, apply frame-skip, analyze and publish
    pub fn step(&mut self) -> Step {
        let timeout = Duration::from_millis(self.config.read_timeout_ms);
        let frame = match self.source.read_frame(timeout) {
            Ok(frame) => frame,
            Err(e) => return self.on_read_failure(e),
        };

        if self.consecutive_failures > 0 {
            info!("Frame source recovered after {} failed reads", self.consecutive_failures);
            self.consecutive_failures = 0;
        }

        self.frame_count += 1;
        self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dms_frames_captured_total").increment(1);

        if self.frame_count % u64::from(self.config.frame_skip) != 0 {
            return Step::Skipped;
        }

        let started = Instant::now();
        let status = self.monitor.analyze(&frame, started);
        if status.emotion.is_sentinel() {
            metrics::counter!("dms_signal_unavailable_total").increment(1);
        }
        if status.is_drowsy() {
            self.stats.drowsy_frames.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("dms_drowsy_frames_total").increment(1);
        }
        debug!(
            sequence = frame.sequence,
            emotion = %status.emotion,
            sleep_status = %status.sleep_status,
            sleep_probability = status.sleep_probability,
            "Frame processed"
        );

        self.store.publish(frame, status);
        self.stats.frames_processed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dms_frames_processed_total").increment(1);
        metrics::histogram!("dms_frame_processing_seconds").record(started.elapsed().as_secs_f64());

        Step::Processed
    }

    fn on_read_failure(&mut self, err: CameraError) -> Step {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;
        self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dms_frame_read_failures_total").increment(1);

        warn!("Failed to read frame from camera (attempt {}): {}", failures, err);

        if failures == self.config.max_retries {
            error!(
                "Max retries ({}) reached reading from {}; still retrying",
                self.config.max_retries,
                self.source.describe()
            );
        }

        if failures % self.config.reconnect_after == 0 {
            info!("Reconnecting {} after {} failed reads", self.source.describe(), failures);
            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("dms_camera_reconnects_total").increment(1);
            if let Err(e) = self.source.reconnect() {
                error!("Reconnect failed: {}", e);
            }
        }

        Step::ReadFailed {
            backoff: self.config.backoff(failures),
        }
    }

    fn sleep_while_running(&self, total: Duration) {
        let deadline = Instant::now() + total;
        loop {
            let now = Instant::now();
            if now >= deadline || !self.running.load(Ordering::Acquire) {
                break;
            }
            thread::sleep((deadline - now).min(STOP_POLL));
        }
    }
}
