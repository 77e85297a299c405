//! Frame/status store implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use camera_capture::VideoFrame;
use dms::DriverStatus;
use tracing::trace;

/// Latest frame and status, each behind its own lock.
///
/// Frame and status are replaced independently, so a reader may see a new
/// status next to the previous frame, but never a half-written value of
/// either. Lock scope is limited to swapping or cloning a handle; encoding
/// happens on the caller's side after the guard is dropped.
pub struct FrameStore {
    /// Latest processed frame (None before the first publish)
    frame: RwLock<Option<Arc<VideoFrame>>>,
    /// Latest driver status
    status: RwLock<DriverStatus>,
    /// Total frames published (for statistics)
    published: AtomicU64,
}

impl FrameStore {
    pub fn new() -> Self {
        Self {
            frame: RwLock::new(None),
            status: RwLock::new(DriverStatus::default()),
            published: AtomicU64::new(0),
        }
    }

    /// Publish a processed frame and its status.
    ///
    /// The status is written before the frame.
    pub fn publish(&self, frame: VideoFrame, status: DriverStatus) {
        self.publish_status(status);
        self.publish_frame(frame);
        let total = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(total, "Frame published");
    }

    pub fn publish_status(&self, status: DriverStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn publish_frame(&self, frame: VideoFrame) {
        let frame = Arc::new(frame);
        // Old frame is dropped after the guard is released
        let previous = {
            let mut slot = self.frame.write().unwrap_or_else(PoisonError::into_inner);
            slot.replace(frame)
        };
        drop(previous);
    }

    /// Copy of the latest status
    pub fn read_status(&self) -> DriverStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared handle to the latest frame, `None` before the first publish
    pub fn read_frame_snapshot(&self) -> Option<Arc<VideoFrame>> {
        self.frame
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_frame(&self) -> bool {
        self.frame.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Get total frames published (for statistics)
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::{Emotion, EmotionLabel, SleepStatus};

    fn status(prob: f32) -> DriverStatus {
        DriverStatus::new(EmotionLabel::Detected(Emotion::Neutral), SleepStatus::Awake, prob)
    }

    #[test]
    fn test_empty_store() {
        let store = FrameStore::new();
        assert!(store.read_frame_snapshot().is_none());
        assert!(!store.has_frame());
        assert_eq!(store.read_status(), DriverStatus::default());
        assert_eq!(store.published_count(), 0);
    }

    #[test]
    fn test_publish_and_read() {
        let store = FrameStore::new();
        store.publish(VideoFrame::filled(4, 4, [1, 2, 3]), status(0.3));

        let frame = store.read_frame_snapshot().unwrap();
        assert_eq!(frame.get_pixel(0, 0), Some([1, 2, 3]));
        assert_eq!(store.read_status(), status(0.3));
        assert_eq!(store.published_count(), 1);
    }

    #[test]
    fn test_read_status_is_idempotent() {
        let store = FrameStore::new();
        store.publish(VideoFrame::filled(2, 2, [0, 0, 0]), status(0.55));
        let first = store.read_status();
        for _ in 0..100 {
            assert_eq!(store.read_status(), first);
        }
    }

    #[test]
    fn test_snapshot_survives_overwrite() {
        let store = FrameStore::new();
        store.publish_frame(VideoFrame::filled(2, 2, [7, 7, 7]));
        let old = store.read_frame_snapshot().unwrap();
        store.publish_frame(VideoFrame::filled(2, 2, [9, 9, 9]));

        assert_eq!(old.get_pixel(1, 1), Some([7, 7, 7]));
        assert_eq!(store.read_frame_snapshot().unwrap().get_pixel(1, 1), Some([9, 9, 9]));
    }

    #[test]
    fn test_fields_update_independently() {
        let store = FrameStore::new();
        store.publish_status(status(0.8));
        assert!(store.read_frame_snapshot().is_none());
        assert_eq!(store.read_status().sleep_probability, 0.8);
    }
}
