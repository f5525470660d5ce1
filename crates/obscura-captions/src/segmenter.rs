//! Caption segmentation.

use obscura_models::encoding::CAPTION_WORDS_PER_SEGMENT;
use obscura_models::{CaptionSegment, CaptionWord};

/// Group transcribed words into caption segments.
///
/// Words are taken in chronological order in fixed-size windows; segment
/// timing always comes from the first and last word in the window.
pub fn segment_words(words: &[CaptionWord]) -> Vec<CaptionSegment> {
    words
        .chunks(CAPTION_WORDS_PER_SEGMENT)
        .enumerate()
        .filter_map(|(i, chunk)| CaptionSegment::from_words(i as u32, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> Vec<CaptionWord> {
        (0..n)
            .map(|i| CaptionWord::new(format!("w{i}"), 0.9, i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(segment_words(&[]).is_empty());
    }

    #[test]
    fn test_window_size_and_ids() {
        let segments = segment_words(&words(20));
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].words.len(), CAPTION_WORDS_PER_SEGMENT);
        assert_eq!(segments[1].words.len(), CAPTION_WORDS_PER_SEGMENT);
        assert_eq!(segments[2].words.len(), 4);
        assert_eq!(
            segments.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_segment_times_come_from_words() {
        let input = words(10);
        let segments = segment_words(&input);
        assert!((segments[0].start_time - input[0].start_time).abs() < f64::EPSILON);
        assert!((segments[0].end_time - input[7].end_time).abs() < f64::EPSILON);
        assert!((segments[1].start_time - input[8].start_time).abs() < f64::EPSILON);
    }

    #[test]
    fn test_segments_are_chronological_and_complete() {
        let segments = segment_words(&words(17));
        let mut prev_end = f64::MIN;
        for s in &segments {
            assert!(s.start_time >= prev_end - f64::EPSILON);
            assert!(s.is_complete);
            prev_end = s.end_time;
        }
    }
}
