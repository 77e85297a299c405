//! Per-frame driver status

use serde::Serialize;

use crate::detector::SignalError;
use crate::emotion::EmotionLabel;
use crate::state::SleepStatus;

/// Status published after each processed frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DriverStatus {
    /// Dominant emotion or a sentinel
    pub emotion: EmotionLabel,

    /// Sleep status from the state machine
    pub sleep_status: SleepStatus,

    /// Sleep probability rounded to 2 decimals
    pub sleep_probability: f32,
}

impl DriverStatus {
    pub fn new(emotion: EmotionLabel, sleep_status: SleepStatus, sleep_probability: f32) -> Self {
        Self {
            emotion,
            sleep_status,
            sleep_probability: round2(sleep_probability),
        }
    }

    /// Non-committal status for a frame without usable signals
    pub fn unavailable(emotion: EmotionLabel) -> Self {
        Self {
            emotion,
            sleep_status: SleepStatus::Unknown,
            sleep_probability: 0.0,
        }
    }

    /// Whether the driver needs attention
    pub fn is_drowsy(&self) -> bool {
        matches!(self.sleep_status, SleepStatus::PossiblyAsleep | SleepStatus::Asleep)
    }
}

impl From<SignalError> for DriverStatus {
    fn from(err: SignalError) -> Self {
        Self::unavailable(err.sentinel())
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
