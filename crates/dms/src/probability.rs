//! Sleep probability from emotion scores

use crate::emotion::{Emotion, EmotionScores};

/// Emotions that indicate drowsiness and their weights
pub const SLEEP_WEIGHTS: [(Emotion, f32); 4] = [
    (Emotion::Sad, 0.4),
    (Emotion::Neutral, 0.3),
    (Emotion::Fear, 0.2),
    (Emotion::Angry, 0.1),
];

/// Weighted mean of the drowsiness-indicating emotions present in `scores`,
/// clamped to at most 1.0.
///
/// Only the weights of labels actually present contribute to the
/// denominator. Returns 0.0 when none of them are present.
pub fn estimate(scores: &EmotionScores) -> f32 {
    let mut weighted_sum = 0.0f32;
    let mut total_weight = 0.0f32;

    for (emotion, weight) in SLEEP_WEIGHTS {
        if let Some(score) = scores.get(emotion) {
            weighted_sum += score * weight;
            total_weight += weight;
        }
    }

    if total_weight == 0.0 {
        return 0.0;
    }

    (weighted_sum / total_weight).min(1.0)
}
