//! Caption data model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A single transcribed word with timing and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CaptionWord {
    /// The word text
    pub word: String,

    /// Recognition confidence
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,

    /// Start time in seconds from the start of the video
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,
}

impl CaptionWord {
    pub fn new(word: impl Into<String>, confidence: f64, start_time: f64, end_time: f64) -> Self {
        Self {
            word: word.into(),
            confidence,
            start_time,
            end_time,
        }
    }
}

/// A group of consecutive words rendered as one caption line.
///
/// Segment timing always derives from the first and last word; it is never
/// invented. Once `is_complete` is set the segment is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    /// Segment index, chronological
    pub id: u32,

    /// Joined display text
    pub text: String,

    /// Words in chronological order
    pub words: Vec<CaptionWord>,

    /// Start time of the first word, seconds
    pub start_time: f64,

    /// End time of the last word, seconds
    pub end_time: f64,

    /// Sealed against further mutation
    pub is_complete: bool,
}

impl CaptionSegment {
    /// Build a sealed segment from an ordered, non-empty word group.
    ///
    /// Returns `None` for an empty group since there would be no timestamps
    /// to derive timing from.
    pub fn from_words(id: u32, words: Vec<CaptionWord>) -> Option<Self> {
        let first = words.first()?;
        let last = words.last()?;
        let start_time = first.start_time;
        let end_time = last.end_time;
        let text = words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Some(Self {
            id,
            text,
            words,
            start_time,
            end_time,
            is_complete: true,
        })
    }

    /// Duration of the segment in seconds.
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// Captions for a whole video, persisted as a sidecar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionData {
    /// Path of the video these captions were generated from
    pub video_path: String,

    /// BCP-47 language tag of the transcription
    pub language: String,

    /// Chronologically ordered segments
    pub segments: Vec<CaptionSegment>,

    /// When the transcription was produced
    pub generated_at: DateTime<Utc>,
}

impl CaptionData {
    /// Full transcript text, segments joined by spaces.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether there is anything to render.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> CaptionWord {
        CaptionWord::new(text, 0.9, start, end)
    }

    #[test]
    fn test_segment_timing_from_words() {
        let seg = CaptionSegment::from_words(
            0,
            vec![word("hello", 1.0, 1.4), word("world", 1.5, 2.0)],
        )
        .unwrap();

        assert_eq!(seg.text, "hello world");
        assert!((seg.start_time - 1.0).abs() < f64::EPSILON);
        assert!((seg.end_time - 2.0).abs() < f64::EPSILON);
        assert!(seg.is_complete);
    }

    #[test]
    fn test_empty_group_yields_no_segment() {
        assert!(CaptionSegment::from_words(0, vec![]).is_none());
    }

    #[test]
    fn test_full_text() {
        let data = CaptionData {
            video_path: "/tmp/a.mp4".into(),
            language: "en-US".into(),
            segments: vec![
                CaptionSegment::from_words(0, vec![word("one", 0.0, 0.5)]).unwrap(),
                CaptionSegment::from_words(1, vec![word("two", 0.6, 1.0)]).unwrap(),
            ],
            generated_at: Utc::now(),
        };
        assert_eq!(data.full_text(), "one two");
    }

    #[test]
    fn test_word_confidence_bounds() {
        let ok = CaptionWord::new("hi", 0.5, 0.0, 0.2);
        assert!(ok.validate().is_ok());
        let bad = CaptionWord::new("hi", 1.5, 0.0, 0.2);
        assert!(bad.validate().is_err());
    }
}
