//! Emotion labels and per-frame emotion scores

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

/// Closed set of emotions produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// All labels, in classifier output order
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse a raw label, ignoring case and surrounding whitespace
    pub fn parse(raw: &str) -> Option<Self> {
        let label = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|e| e.as_str() == label)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emotion field of a published status: a real label or a sentinel
/// explaining why no label was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmotionLabel {
    Detected(Emotion),
    #[default]
    Unknown,
    NoFace,
    Error,
    InvalidFrame,
    NoModel,
}

impl EmotionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Detected(e) => e.as_str(),
            EmotionLabel::Unknown => "unknown",
            EmotionLabel::NoFace => "no_face",
            EmotionLabel::Error => "error",
            EmotionLabel::InvalidFrame => "invalid_frame",
            EmotionLabel::NoModel => "no_model",
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, EmotionLabel::Detected(_))
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EmotionLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Map a raw classifier label onto the allowed set.
///
/// Anything outside the seven known emotions becomes `unknown`.
pub fn sanitize_emotion_label(raw: &str) -> EmotionLabel {
    match Emotion::parse(raw) {
        Some(emotion) => EmotionLabel::Detected(emotion),
        None => {
            warn!("Unknown emotion detected: {:?}", raw);
            EmotionLabel::Unknown
        }
    }
}

/// Scores for one detected face, keyed by emotion.
///
/// A label may be absent. Stored scores are finite and non-negative;
/// values above 1.0 are kept as reported.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmotionScores {
    scores: [Option<f32>; 7],
}

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores in classifier output order, all labels present
    pub fn from_ordered(values: [f32; 7]) -> Self {
        let mut scores = Self::new();
        for (emotion, value) in Emotion::ALL.into_iter().zip(values) {
            scores.set(emotion, value);
        }
        scores
    }

    /// Build from string-keyed scores, dropping labels outside the known set
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut scores = Self::new();
        for (label, value) in labels {
            if let EmotionLabel::Detected(emotion) = sanitize_emotion_label(label) {
                scores.set(emotion, value);
            }
        }
        scores
    }

    /// Record a score. Non-finite values are ignored, negatives clamp to 0.
    pub fn set(&mut self, emotion: Emotion, score: f32) {
        if score.is_finite() {
            self.scores[emotion.index()] = Some(score.max(0.0));
        }
    }

    pub fn with(mut self, emotion: Emotion, score: f32) -> Self {
        self.set(emotion, score);
        self
    }

    pub fn get(&self, emotion: Emotion) -> Option<f32> {
        self.scores[emotion.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.scores.iter().all(Option::is_none)
    }

    /// Present labels and their scores
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL
            .into_iter()
            .filter_map(move |e| self.get(e).map(|s| (e, s)))
    }

    /// Highest scoring label; ties resolve to the earlier label
    pub fn dominant(&self) -> Option<Emotion> {
        let mut best: Option<(Emotion, f32)> = None;
        for (emotion, score) in self.iter() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((emotion, score)),
            }
        }
        best.map(|(e, _)| e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_known_labels() {
        assert_eq!(sanitize_emotion_label("happy"), EmotionLabel::Detected(Emotion::Happy));
        assert_eq!(sanitize_emotion_label("SAD"), EmotionLabel::Detected(Emotion::Sad));
        assert_eq!(sanitize_emotion_label("  Neutral \n"), EmotionLabel::Detected(Emotion::Neutral));
    }

    #[test]
    fn test_sanitize_unsupported_label() {
        assert_eq!(sanitize_emotion_label("invalid_emotion"), EmotionLabel::Unknown);
        assert_eq!(sanitize_emotion_label(""), EmotionLabel::Unknown);
        assert_eq!(sanitize_emotion_label("<script>"), EmotionLabel::Unknown);
    }

    #[test]
    fn test_sentinel_strings() {
        assert_eq!(EmotionLabel::NoFace.as_str(), "no_face");
        assert_eq!(EmotionLabel::InvalidFrame.as_str(), "invalid_frame");
        assert_eq!(EmotionLabel::NoModel.as_str(), "no_model");
        assert!(EmotionLabel::Error.is_sentinel());
        assert!(!EmotionLabel::Detected(Emotion::Fear).is_sentinel());
    }

    #[test]
    fn test_from_labels_drops_unknown() {
        let scores = EmotionScores::from_labels([("sad", 0.5), ("sleepy", 0.9), ("Happy", 0.2)]);
        assert_eq!(scores.get(Emotion::Sad), Some(0.5));
        assert_eq!(scores.get(Emotion::Happy), Some(0.2));
        assert_eq!(scores.iter().count(), 2);
    }

    #[test]
    fn test_non_finite_scores_ignored() {
        let scores = EmotionScores::new()
            .with(Emotion::Sad, f32::NAN)
            .with(Emotion::Fear, -0.3);
        assert_eq!(scores.get(Emotion::Sad), None);
        assert_eq!(scores.get(Emotion::Fear), Some(0.0));
    }

    #[test]
    fn test_dominant() {
        let scores = EmotionScores::from_ordered([0.05, 0.0, 0.1, 0.6, 0.15, 0.0, 0.1]);
        assert_eq!(scores.dominant(), Some(Emotion::Happy));
        assert_eq!(EmotionScores::new().dominant(), None);
    }
}
