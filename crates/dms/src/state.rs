//! Sleep-state tracking across frames

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::debug;

/// Published sleep status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SleepStatus {
    Awake,
    PossiblyAsleep,
    Asleep,
    /// No usable signal for this frame
    #[default]
    Unknown,
}

impl SleepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStatus::Awake => "Awake",
            SleepStatus::PossiblyAsleep => "Possibly Asleep",
            SleepStatus::Asleep => "Asleep",
            SleepStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SleepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SleepStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Duration and probability cut-offs for the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepThresholds {
    /// Continuous closure after which the driver is Asleep
    pub asleep_after: Duration,
    /// Closure length after which re-opening counts as waking up
    pub awake_after: Duration,
    /// Sleep probability above which open eyes still read Possibly Asleep
    pub probability_threshold: f32,
}

impl Default for SleepThresholds {
    fn default() -> Self {
        Self {
            asleep_after: Duration::from_secs(5),
            awake_after: Duration::from_secs(10),
            probability_threshold: 0.7,
        }
    }
}

/// Eye-closure latch with duration thresholds and a probability fallback.
///
/// The only state carried between frames is the instant the current eye
/// closure started. Owned by the capture loop; frames without a usable
/// signal must not be fed in.
#[derive(Debug, Clone, Default)]
pub struct SleepStateMachine {
    eye_closed_since: Option<Instant>,
    thresholds: SleepThresholds,
}

impl SleepStateMachine {
    pub fn new(thresholds: SleepThresholds) -> Self {
        Self {
            eye_closed_since: None,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &SleepThresholds {
        &self.thresholds
    }

    /// Start of the ongoing eye closure, if any
    pub fn eye_closed_since(&self) -> Option<Instant> {
        self.eye_closed_since
    }

    /// Advance the machine by one processed frame
    pub fn transition(&mut self, eyes_closed: bool, sleep_prob: f32, now: Instant) -> SleepStatus {
        if eyes_closed {
            self.on_eyes_closed(now)
        } else {
            self.on_eyes_open(sleep_prob, now)
        }
    }

    fn on_eyes_closed(&mut self, now: Instant) -> SleepStatus {
        let Some(since) = self.eye_closed_since else {
            // First closed frame could be a blink
            self.eye_closed_since = Some(now);
            return SleepStatus::PossiblyAsleep;
        };

        if now.saturating_duration_since(since) >= self.thresholds.asleep_after {
            SleepStatus::Asleep
        } else {
            SleepStatus::PossiblyAsleep
        }
    }

    fn on_eyes_open(&mut self, sleep_prob: f32, now: Instant) -> SleepStatus {
        if let Some(since) = self.eye_closed_since.take() {
            let closed_for = now.saturating_duration_since(since);
            if closed_for >= self.thresholds.awake_after {
                debug!("Eyes reopened after {:?}, treating as woken up", closed_for);
                return SleepStatus::Awake;
            }
        }

        if sleep_prob > self.thresholds.probability_threshold {
            SleepStatus::PossiblyAsleep
        } else {
            SleepStatus::Awake
        }
    }
}
