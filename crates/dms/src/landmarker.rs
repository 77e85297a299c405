//! ONNX face mesh landmarker backed by tract

use std::path::Path;

use camera_capture::frame::VideoFrame;
use tract_onnx::prelude::*;
use tracing::{error, info};

use crate::detector::{EyeLandmarks, FaceBbox, FaceLandmarker, FaceLandmarks, SignalError};
use crate::DmsError;

/// Side of the square RGB input the model expects
pub const INPUT_SIZE: usize = 192;

/// Points in one face mesh
pub const MESH_POINTS: usize = 468;

/// Presence probability below which the frame has no face
pub const PRESENCE_THRESHOLD: f32 = 0.5;

/// Face mesh indices of each eye contour, in EAR order
const LEFT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];
const RIGHT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Face mesh model: 1x192x192x3 RGB input in [0, 1].
///
/// Output 0 holds 468 `(x, y, z)` points in input pixel coordinates.
/// An optional output 1 holds the face presence logit.
pub struct OnnxFaceLandmarker {
    model: TypedRunnableModel<TypedModel>,
}

impl OnnxFaceLandmarker {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DmsError> {
        let path = path.as_ref();
        info!("Loading face landmark model from {}", path.display());

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, INPUT_SIZE, INPUT_SIZE, 3)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                error!("Failed to load face landmark model: {}", e);
                DmsError::ModelLoad(e.to_string())
            })?;

        Ok(Self { model })
    }

    fn build_input(frame: &VideoFrame) -> Result<Tensor, SignalError> {
        let pixels: Vec<f32> = frame
            .resize(INPUT_SIZE as u32, INPUT_SIZE as u32)
            .data
            .iter()
            .map(|&v| v as f32 / 255.0)
            .collect();

        Tensor::from_shape(&[1, INPUT_SIZE, INPUT_SIZE, 3], &pixels)
            .map_err(|e| SignalError::Detector(e.to_string()))
    }
}

impl FaceLandmarker for OnnxFaceLandmarker {
    fn locate(&self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, SignalError> {
        let input = Self::build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| SignalError::Detector(format!("landmark inference failed: {}", e)))?;

        let mesh = outputs
            .first()
            .ok_or_else(|| SignalError::Detector("landmark model produced no outputs".into()))?
            .to_array_view::<f32>()
            .map_err(|e| SignalError::Detector(e.to_string()))?;
        let points: Vec<f32> = mesh.iter().copied().collect();

        let presence = match outputs.get(1) {
            Some(score) => score
                .to_array_view::<f32>()
                .map_err(|e| SignalError::Detector(e.to_string()))?
                .iter()
                .next()
                .copied(),
            None => None,
        };

        decode_mesh(&points, presence, frame.width, frame.height)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Map a raw mesh onto a `width` x `height` frame.
///
/// `presence` is the raw logit; `None` means the model has no presence head.
pub fn decode_mesh(
    points: &[f32],
    presence: Option<f32>,
    width: u32,
    height: u32,
) -> Result<Option<FaceLandmarks>, SignalError> {
    let confidence = presence.map_or(1.0, sigmoid);
    if confidence < PRESENCE_THRESHOLD {
        return Ok(None);
    }
    if points.len() < MESH_POINTS * 3 {
        return Err(SignalError::Detector(format!(
            "expected {} mesh values, got {}",
            MESH_POINTS * 3,
            points.len()
        )));
    }

    let sx = width as f32 / INPUT_SIZE as f32;
    let sy = height as f32 / INPUT_SIZE as f32;
    let point = |i: usize| (points[i * 3] * sx, points[i * 3 + 1] * sy);

    let (mut x0, mut y0, mut x1, mut y1) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for i in 0..MESH_POINTS {
        let (x, y) = point(i);
        if !(x.is_finite() && y.is_finite()) {
            return Err(SignalError::Detector("non-finite landmark".into()));
        }
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }

    let eye = |indices: [usize; 6]| -> EyeLandmarks { indices.map(|i| point(i)) };

    Ok(Some(FaceLandmarks {
        bbox: FaceBbox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            confidence,
        },
        left_eye: eye(LEFT_EYE),
        right_eye: eye(RIGHT_EYE),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mesh spread over the middle of the input, with both eyes at `lid` half-height
    fn mesh(lid: f32) -> Vec<f32> {
        let mut points = vec![0.0; MESH_POINTS * 3];
        for i in 0..MESH_POINTS {
            points[i * 3] = 48.0 + (i % 96) as f32;
            points[i * 3 + 1] = 48.0 + (i % 80) as f32;
        }
        for (eye, cx) in [(LEFT_EYE, 120.0), (RIGHT_EYE, 72.0)] {
            let contour = [
                (cx - 12.0, 80.0),
                (cx - 4.0, 80.0 - lid),
                (cx + 4.0, 80.0 - lid),
                (cx + 12.0, 80.0),
                (cx + 4.0, 80.0 + lid),
                (cx - 4.0, 80.0 + lid),
            ];
            for (&idx, (x, y)) in eye.iter().zip(contour) {
                points[idx * 3] = x;
                points[idx * 3 + 1] = y;
            }
        }
        points
    }

    #[test]
    fn test_decode_open_and_closed_eyes() {
        let open = decode_mesh(&mesh(6.0), Some(4.0), 192, 192).unwrap().unwrap();
        assert!(!open.eyes_closed(0.25));
        assert!((open.mean_ear() - 0.5).abs() < 1e-5);

        let closed = decode_mesh(&mesh(1.0), Some(4.0), 192, 192).unwrap().unwrap();
        assert!(closed.eyes_closed(0.25));
    }

    #[test]
    fn test_decode_scales_to_frame() {
        let face = decode_mesh(&mesh(6.0), None, 384, 96).unwrap().unwrap();
        assert_eq!(face.bbox.confidence, 1.0);
        assert_eq!(face.bbox.x, 96.0);
        assert_eq!(face.bbox.y, 24.0);
        assert_eq!(face.right_eye[0], (120.0, 40.0));
        assert!(face.bbox.clip(384, 96).is_some());
    }

    #[test]
    fn test_low_presence_is_no_face() {
        assert_eq!(decode_mesh(&mesh(6.0), Some(-3.0), 192, 192), Ok(None));
    }

    #[test]
    fn test_short_output_is_detector_error() {
        let result = decode_mesh(&[0.0; 30], None, 192, 192);
        assert!(matches!(result, Err(SignalError::Detector(_))));
    }

    #[test]
    fn test_missing_model_file() {
        assert!(matches!(
            OnnxFaceLandmarker::load("/nonexistent/face_mesh.onnx"),
            Err(DmsError::ModelLoad(_))
        ));
    }
}
