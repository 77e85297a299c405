use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use camera_capture::VideoFrame;
use dms::{DriverStatus, Emotion, EmotionLabel, SleepStatus};
use frame_store::FrameStore;
use proptest::prelude::*;

const WRITES: u32 = 2_000;
const READERS: usize = 8;

/// Every byte of frame `i` is `i % 251`; its status encodes the same value.
fn pattern(i: u32) -> (VideoFrame, DriverStatus) {
    let value = (i % 251) as u8;
    let frame = VideoFrame::new(vec![value; 64 * 48 * 3], 64, 48, i as u64, i);
    let sleep_status = if i % 2 == 0 { SleepStatus::Asleep } else { SleepStatus::Awake };
    let status = DriverStatus::new(
        EmotionLabel::Detected(Emotion::Sad),
        sleep_status,
        (i % 100) as f32 / 100.0,
    );
    (frame, status)
}

#[test]
fn readers_never_observe_torn_frames() {
    let store = Arc::new(FrameStore::new());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_sequence = 0u32;
                let mut observed = 0u64;
                while !done.load(Ordering::Acquire) {
                    if let Some(frame) = store.read_frame_snapshot() {
                        let first = frame.data[0];
                        assert!(frame.data.iter().all(|&b| b == first), "torn frame {}", frame.sequence);
                        assert_eq!(first, (frame.sequence % 251) as u8);
                        assert!(frame.sequence >= last_sequence, "frame went backwards");
                        last_sequence = frame.sequence;
                        observed += 1;
                    }

                    let status = store.read_status();
                    if status.sleep_status != SleepStatus::Unknown {
                        // Probability and status come from the same publish
                        let i = (status.sleep_probability * 100.0).round() as u32;
                        let expected = if i % 2 == 0 { SleepStatus::Asleep } else { SleepStatus::Awake };
                        assert_eq!(status.sleep_status, expected);
                    }
                }
                observed
            })
        })
        .collect();

    for i in 1..=WRITES {
        let (frame, status) = pattern(i);
        store.publish(frame, status);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().expect("reader panicked");
    }

    assert_eq!(store.published_count(), WRITES as u64);
    assert_eq!(store.read_frame_snapshot().unwrap().sequence, WRITES);
}

proptest! {
    #[test]
    fn last_write_wins(sequence in proptest::collection::vec(0u32..10_000, 1..40)) {
        let store = FrameStore::new();
        for &i in &sequence {
            let (frame, status) = pattern(i);
            store.publish(frame, status);
        }
        let last = *sequence.last().unwrap();
        let (_, expected) = pattern(last);
        prop_assert_eq!(store.read_status(), expected);
        prop_assert_eq!(store.read_frame_snapshot().unwrap().sequence, last);
    }
}
