//! ONNX emotion classifier backed by tract

use std::path::Path;

use camera_capture::frame::VideoFrame;
use tract_onnx::prelude::*;
use tracing::{error, info};

use crate::detector::{EmotionClassifier, SignalError};
use crate::emotion::EmotionScores;
use crate::DmsError;

/// Side of the square grayscale face crop the model expects
pub const INPUT_SIZE: usize = 48;

/// Output labels of the FER model, in output order
pub const MODEL_LABELS: [&str; 7] = ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"];

/// FER-style classifier: 1x1x48x48 grayscale input in [0, 1], one output
/// per entry of [`MODEL_LABELS`].
pub struct OnnxEmotionClassifier {
    model: TypedRunnableModel<TypedModel>,
}

impl OnnxEmotionClassifier {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DmsError> {
        let path = path.as_ref();
        info!("Loading emotion model from {}", path.display());

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(
                        f32::datum_type(),
                        tvec!(1, 1, INPUT_SIZE, INPUT_SIZE),
                    ),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                error!("Failed to load emotion model: {}", e);
                DmsError::ModelLoad(e.to_string())
            })?;

        Ok(Self { model })
    }

    fn build_input(face: &VideoFrame) -> Result<Tensor, SignalError> {
        let pixels: Vec<f32> = face
            .resize(INPUT_SIZE as u32, INPUT_SIZE as u32)
            .to_grayscale()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect();

        Tensor::from_shape(&[1, 1, INPUT_SIZE, INPUT_SIZE], &pixels)
            .map_err(|e| SignalError::Detector(e.to_string()))
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&self, face: &VideoFrame) -> Result<EmotionScores, SignalError> {
        let input = Self::build_input(face)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| SignalError::Detector(format!("emotion inference failed: {}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| SignalError::Detector("model produced no outputs".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| SignalError::Detector(e.to_string()))?;

        let logits: Vec<f32> = view.iter().copied().collect();
        let values: [f32; 7] = logits.as_slice().try_into().map_err(|_| {
            SignalError::Detector(format!("expected 7 emotion outputs, got {}", logits.len()))
        })?;

        Ok(scores_from_outputs(&MODEL_LABELS, values))
    }
}

/// Normalize raw outputs and key them by the model's label names.
///
/// Labels outside the supported set are dropped by the sanitizer.
fn scores_from_outputs(labels: &[&str; 7], values: [f32; 7]) -> EmotionScores {
    EmotionScores::from_labels(labels.iter().copied().zip(normalize(values)))
}

/// Pass probabilities through unchanged, softmax raw logits
fn normalize(values: [f32; 7]) -> [f32; 7] {
    let sum: f32 = values.iter().sum();
    let is_distribution = values.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return values;
    }

    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = values.map(|v| (v - max).exp());
    let total: f32 = exp.iter().sum();
    exp.map(|v| v / total)
}
