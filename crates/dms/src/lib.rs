//! Driver Monitoring System (DMS)
//!
//! Real-time drowsiness detection from a cabin camera:
//! - Emotion scoring of the driver's face
//! - Sleep probability from drowsiness-indicating emotions
//! - Eye closure from the eye aspect ratio of facial landmarks
//! - A sleep-state machine fusing both signals over time

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod emotion;
pub mod landmarker;
pub mod probability;
pub mod state;

pub use analysis::DriverStatus;
pub use classifier::OnnxEmotionClassifier;
pub use config::DmsConfig;
pub use detector::{
    eye_aspect_ratio, EmotionClassifier, FaceBbox, FaceLandmarker, FaceLandmarks, FrameSignals,
    SignalError, SignalExtractor,
};
pub use emotion::{sanitize_emotion_label, Emotion, EmotionLabel, EmotionScores};
pub use landmarker::OnnxFaceLandmarker;
pub use probability::estimate;
pub use state::{SleepStateMachine, SleepStatus, SleepThresholds};

use std::time::Instant;

use camera_capture::frame::VideoFrame;
use thiserror::Error;
use tracing::{debug, warn};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Per-frame drowsiness analysis.
///
/// Owns the sleep-state machine, so exactly one monitor should exist per
/// capture loop.
pub struct DrowsinessMonitor {
    extractor: SignalExtractor,
    state: SleepStateMachine,
}

impl DrowsinessMonitor {
    /// Build a monitor from configuration, loading every configured model.
    ///
    /// A configured model that fails to load is an error; an unconfigured
    /// one makes every frame report `no_model`.
    pub fn new(config: &DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;

        let landmarker: Option<Box<dyn FaceLandmarker>> = match &config.landmark_model_path {
            Some(path) => Some(Box::new(OnnxFaceLandmarker::load(path)?)),
            None => {
                warn!("No face landmark model configured; frames will report no_model");
                None
            }
        };
        let classifier: Option<Box<dyn EmotionClassifier>> = match &config.emotion_model_path {
            Some(path) => Some(Box::new(OnnxEmotionClassifier::load(path)?)),
            None => {
                warn!("No emotion model configured; frames will report no_model");
                None
            }
        };

        Ok(Self::with_extractor(
            SignalExtractor::new(landmarker, classifier, config.ear_threshold),
            config.thresholds(),
        ))
    }

    pub fn with_extractor(extractor: SignalExtractor, thresholds: SleepThresholds) -> Self {
        Self {
            extractor,
            state: SleepStateMachine::new(thresholds),
        }
    }

    /// Analyze a single frame captured at `now`.
    ///
    /// Frames without usable signals produce a sentinel status and leave
    /// the closure tracking untouched.
    pub fn analyze(&mut self, frame: &VideoFrame, now: Instant) -> DriverStatus {
        match self.extractor.extract(frame) {
            Ok(signals) => {
                let sleep_prob = estimate(&signals.scores);
                let sleep_status = self.state.transition(signals.eyes_closed, sleep_prob, now);
                DriverStatus::new(signals.emotion, sleep_status, sleep_prob)
            }
            Err(SignalError::Detector(reason)) => {
                warn!("Error in emotion detection: {}", reason);
                DriverStatus::from(SignalError::Detector(reason))
            }
            Err(e) => {
                debug!("No signal for frame {}: {}", frame.sequence, e);
                DriverStatus::from(e)
            }
        }
    }

    pub fn state(&self) -> &SleepStateMachine {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Landmarker replaying a shared script of eye states
    struct ScriptedLandmarker {
        script: Arc<Mutex<Vec<Option<bool>>>>,
    }

    impl FaceLandmarker for ScriptedLandmarker {
        fn locate(&self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, SignalError> {
            let next = self.script.lock().unwrap().remove(0);
            Ok(next.map(|closed| {
                let lid = if closed { 0.05 } else { 1.0 };
                let eye = [(0.0, 0.0), (1.0, -lid), (2.0, -lid), (3.0, 0.0), (2.0, lid), (1.0, lid)];
                FaceLandmarks {
                    bbox: FaceBbox { x: 0.0, y: 0.0, width: 4.0, height: 4.0, confidence: 1.0 },
                    left_eye: eye,
                    right_eye: eye,
                }
            }))
        }
    }

    struct SadClassifier;

    impl EmotionClassifier for SadClassifier {
        fn classify(&self, _face: &VideoFrame) -> Result<EmotionScores, SignalError> {
            Ok(EmotionScores::new().with(Emotion::Sad, 0.9).with(Emotion::Happy, 0.1))
        }
    }

    fn monitor(script: Vec<Option<bool>>) -> DrowsinessMonitor {
        let extractor = SignalExtractor::new(
            Some(Box::new(ScriptedLandmarker { script: Arc::new(Mutex::new(script)) })),
            Some(Box::new(SadClassifier)),
            0.25,
        );
        DrowsinessMonitor::with_extractor(extractor, SleepThresholds::default())
    }

    #[test]
    fn test_analyze_drives_state_machine() {
        let frame = VideoFrame::filled(8, 8, [0, 0, 0]);
        let t0 = Instant::now();
        let mut m = monitor(vec![Some(true), Some(true), Some(false)]);

        let first = m.analyze(&frame, t0);
        assert_eq!(first.emotion, EmotionLabel::Detected(Emotion::Sad));
        assert_eq!(first.sleep_status, SleepStatus::PossiblyAsleep);
        assert_eq!(first.sleep_probability, 0.9);

        assert_eq!(m.analyze(&frame, t0 + Duration::from_secs(6)).sleep_status, SleepStatus::Asleep);
        assert_eq!(m.analyze(&frame, t0 + Duration::from_secs(11)).sleep_status, SleepStatus::Awake);
    }

    #[test]
    fn test_missing_face_does_not_touch_closure() {
        let frame = VideoFrame::filled(8, 8, [0, 0, 0]);
        let t0 = Instant::now();
        let mut m = monitor(vec![Some(true), None, Some(true)]);

        m.analyze(&frame, t0);
        let gap = m.analyze(&frame, t0 + Duration::from_secs(2));
        assert_eq!(gap, DriverStatus::unavailable(EmotionLabel::NoFace));
        assert_eq!(m.state().eye_closed_since(), Some(t0));

        let later = m.analyze(&frame, t0 + Duration::from_secs(5));
        assert_eq!(later.sleep_status, SleepStatus::Asleep);
    }

    #[test]
    fn test_unloaded_models_report_no_model() {
        let mut m = DrowsinessMonitor::new(&DmsConfig::default()).unwrap();
        let status = m.analyze(&VideoFrame::filled(8, 8, [0, 0, 0]), Instant::now());
        assert_eq!(status.emotion, EmotionLabel::NoModel);
        assert_eq!(status.sleep_status, SleepStatus::Unknown);
        assert_eq!(m.state().eye_closed_since(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DmsConfig { ear_threshold: 0.0, ..Default::default() };
        assert!(matches!(DrowsinessMonitor::new(&config), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_configured_models_must_load() {
        let missing_landmarks = DmsConfig {
            landmark_model_path: Some("/nonexistent/face_mesh.onnx".into()),
            ..Default::default()
        };
        assert!(matches!(DrowsinessMonitor::new(&missing_landmarks), Err(DmsError::ModelLoad(_))));

        let missing_emotions = DmsConfig {
            emotion_model_path: Some("/nonexistent/emotion.onnx".into()),
            ..Default::default()
        };
        assert!(matches!(DrowsinessMonitor::new(&missing_emotions), Err(DmsError::ModelLoad(_))));
    }
}
