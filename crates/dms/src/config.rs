//! DMS configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::SleepThresholds;
use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Eye aspect ratio below which the eyes count as closed
    pub ear_threshold: f32,

    /// Continuous eye closure before reporting Asleep (seconds)
    pub asleep_after_secs: f64,

    /// Closure length after which re-opened eyes report Awake (seconds)
    pub awake_after_secs: f64,

    /// Sleep probability cut-off used while the eyes are open
    pub probability_threshold: f32,

    /// Emotion classifier (ONNX, 48x48 grayscale input)
    pub emotion_model_path: Option<String>,

    /// Face mesh landmark model (ONNX, 192x192 RGB input)
    pub landmark_model_path: Option<String>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            asleep_after_secs: 5.0,
            awake_after_secs: 10.0,
            probability_threshold: 0.7,
            emotion_model_path: None,
            landmark_model_path: None,
        }
    }
}

impl DmsConfig {
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(self.ear_threshold > 0.0 && self.ear_threshold < 1.0) {
            return Err(DmsError::Config(format!(
                "ear_threshold must be in (0, 1), got {}",
                self.ear_threshold
            )));
        }
        for (name, value) in [
            ("asleep_after_secs", self.asleep_after_secs),
            ("awake_after_secs", self.awake_after_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DmsError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(0.0..=1.0).contains(&self.probability_threshold) {
            return Err(DmsError::Config(format!(
                "probability_threshold must be in [0, 1], got {}",
                self.probability_threshold
            )));
        }
        Ok(())
    }

    /// State machine thresholds; unrepresentable durations keep the defaults
    pub fn thresholds(&self) -> SleepThresholds {
        let defaults = SleepThresholds::default();
        SleepThresholds {
            asleep_after: Duration::try_from_secs_f64(self.asleep_after_secs)
                .unwrap_or(defaults.asleep_after),
            awake_after: Duration::try_from_secs_f64(self.awake_after_secs)
                .unwrap_or(defaults.awake_after),
            probability_threshold: self.probability_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_thresholds() {
        let config = DmsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds(), SleepThresholds::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_ear = DmsConfig { ear_threshold: 1.5, ..Default::default() };
        assert!(bad_ear.validate().is_err());

        let bad_duration = DmsConfig { asleep_after_secs: 0.0, ..Default::default() };
        assert!(bad_duration.validate().is_err());

        let bad_prob = DmsConfig { probability_threshold: f32::NAN, ..Default::default() };
        assert!(bad_prob.validate().is_err());
    }
}
