//! Face landmarks, eye closure and signal extraction

use camera_capture::frame::VideoFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::emotion::{EmotionLabel, EmotionScores};

/// Why a frame produced no usable signal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("No face detected")]
    NoFace,

    #[error("Detector not loaded")]
    NoModel,

    #[error("Malformed frame")]
    InvalidFrame,

    #[error("Detector failed: {0}")]
    Detector(String),
}

impl SignalError {
    /// Emotion sentinel reported for this failure
    pub fn sentinel(&self) -> EmotionLabel {
        match self {
            SignalError::NoFace => EmotionLabel::NoFace,
            SignalError::NoModel => EmotionLabel::NoModel,
            SignalError::InvalidFrame => EmotionLabel::InvalidFrame,
            SignalError::Detector(_) => EmotionLabel::Error,
        }
    }
}

/// Face bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBbox {
    /// Integer crop rectangle clipped to a `width` x `height` frame
    pub fn clip(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0.0).floor();
        let y0 = self.y.max(0.0).floor();
        let x1 = (self.x + self.width).min(width as f32).ceil();
        let y1 = (self.y + self.height).min(height as f32).ceil();
        if !(x1 > x0 && y1 > y0) {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Six eye contour points, in the 68-point landmark order:
/// outer corner, two upper lid points, inner corner, two lower lid points.
pub type EyeLandmarks = [(f32, f32); 6];

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Eye aspect ratio: (|p2-p6| + |p3-p5|) / (2 |p1-p4|).
///
/// Returns 0.0 for a degenerate eye with zero width.
pub fn eye_aspect_ratio(eye: &EyeLandmarks) -> f32 {
    let vertical = distance(eye[1], eye[5]) + distance(eye[2], eye[4]);
    let horizontal = distance(eye[0], eye[3]);
    if horizontal <= f32::EPSILON {
        return 0.0;
    }
    vertical / (2.0 * horizontal)
}

/// Landmarks of the dominant face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub bbox: FaceBbox,
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
}

impl FaceLandmarks {
    /// Mean eye aspect ratio over both eyes
    pub fn mean_ear(&self) -> f32 {
        (eye_aspect_ratio(&self.left_eye) + eye_aspect_ratio(&self.right_eye)) / 2.0
    }

    pub fn eyes_closed(&self, ear_threshold: f32) -> bool {
        self.mean_ear() < ear_threshold
    }
}

/// Locates the dominant face and its eye landmarks
pub trait FaceLandmarker: Send {
    /// `Ok(None)` when no face is visible
    fn locate(&self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, SignalError>;
}

/// Scores emotions on a cropped face
pub trait EmotionClassifier: Send {
    fn classify(&self, face: &VideoFrame) -> Result<EmotionScores, SignalError>;
}

/// Signals extracted from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSignals {
    /// Dominant emotion, `unknown` when no known label scored
    pub emotion: EmotionLabel,
    pub scores: EmotionScores,
    pub eyes_closed: bool,
}

/// Runs the landmarker and classifier over a frame
pub struct SignalExtractor {
    landmarker: Option<Box<dyn FaceLandmarker>>,
    classifier: Option<Box<dyn EmotionClassifier>>,
    ear_threshold: f32,
}

impl SignalExtractor {
    pub fn new(
        landmarker: Option<Box<dyn FaceLandmarker>>,
        classifier: Option<Box<dyn EmotionClassifier>>,
        ear_threshold: f32,
    ) -> Self {
        Self {
            landmarker,
            classifier,
            ear_threshold,
        }
    }

    pub fn extract(&self, frame: &VideoFrame) -> Result<FrameSignals, SignalError> {
        if !frame.is_valid() {
            return Err(SignalError::InvalidFrame);
        }
        let (Some(landmarker), Some(classifier)) = (&self.landmarker, &self.classifier) else {
            return Err(SignalError::NoModel);
        };

        let face = landmarker.locate(frame)?.ok_or(SignalError::NoFace)?;
        let (x, y, w, h) = face
            .bbox
            .clip(frame.width, frame.height)
            .ok_or(SignalError::NoFace)?;
        let crop = frame
            .crop(x, y, w, h)
            .ok_or_else(|| SignalError::Detector(format!("face crop {}x{}+{}+{} out of bounds", w, h, x, y)))?;

        let scores = classifier.classify(&crop)?;
        let emotion = scores
            .dominant()
            .map(EmotionLabel::Detected)
            .unwrap_or(EmotionLabel::Unknown);
        let ear = face.mean_ear();

        debug!(emotion = %emotion, ear, "Signals extracted");

        Ok(FrameSignals {
            emotion,
            scores,
            eyes_closed: ear < self.ear_threshold,
        })
    }
}
