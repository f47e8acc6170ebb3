//! Time-coded transcript segments for audio and video documents.

mod matcher;

pub use matcher::TimestampMatcher;

use crate::error::{DocentError, Result};
use serde::{Deserialize, Serialize};

/// A span of transcript text with its position in the media, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl TimestampedSegment {
    /// Create a new segment.
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Start time formatted as `M:SS`.
    pub fn format_start(&self) -> String {
        format_timestamp(self.start_time)
    }
}

/// Check that segments are well formed and ordered by start time.
pub fn validate_sequence(segments: &[TimestampedSegment]) -> Result<()> {
    let mut previous_start = 0.0;

    for (i, segment) in segments.iter().enumerate() {
        if !(segment.start_time >= 0.0) {
            return Err(DocentError::Validation(format!(
                "segment {} starts at {}, expected a non-negative time",
                i, segment.start_time
            )));
        }
        if !(segment.end_time >= segment.start_time) {
            return Err(DocentError::Validation(format!(
                "segment {} ends at {} before it starts at {}",
                i, segment.end_time, segment.start_time
            )));
        }
        if segment.start_time < previous_start {
            return Err(DocentError::Validation(format!(
                "segment {} starts at {}, before the previous segment at {}",
                i, segment.start_time, previous_start
            )));
        }
        previous_start = segment.start_time;
    }

    Ok(())
}

/// Format seconds as `M:SS`. Minutes are not folded into hours.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Segments whose text contains the whole topic, case-insensitively.
pub fn segments_matching_topic(segments: &[TimestampedSegment], topic: &str) -> Vec<TimestampedSegment> {
    let topic = topic.to_lowercase();
    segments
        .iter()
        .filter(|segment| segment.text.to_lowercase().contains(&topic))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "0:00");
        assert_eq!(format_timestamp(65.7), "1:05");
        assert_eq!(format_timestamp(3661.0), "61:01");
        assert_eq!(TimestampedSegment::new(125.0, 130.0, "x").format_start(), "2:05");
    }

    #[test]
    fn test_validate_sequence() {
        let ok = vec![
            TimestampedSegment::new(0.0, 5.0, "a"),
            TimestampedSegment::new(5.0, 5.0, "b"),
            TimestampedSegment::new(5.0, 9.5, "c"),
        ];
        assert!(validate_sequence(&ok).is_ok());
        assert!(validate_sequence(&[]).is_ok());

        let negative = vec![TimestampedSegment::new(-1.0, 2.0, "a")];
        assert!(matches!(validate_sequence(&negative), Err(DocentError::Validation(_))));

        let backwards = vec![TimestampedSegment::new(3.0, 2.0, "a")];
        assert!(validate_sequence(&backwards).is_err());

        let unordered = vec![
            TimestampedSegment::new(4.0, 6.0, "a"),
            TimestampedSegment::new(1.0, 2.0, "b"),
        ];
        assert!(validate_sequence(&unordered).is_err());

        let nan = vec![TimestampedSegment::new(f64::NAN, 2.0, "a")];
        assert!(validate_sequence(&nan).is_err());
    }

    #[test]
    fn test_segments_matching_topic() {
        let segments = vec![
            TimestampedSegment::new(0.0, 5.0, "Introduction to Rust ownership"),
            TimestampedSegment::new(5.0, 10.0, "Borrowing rules"),
            TimestampedSegment::new(10.0, 15.0, "More on OWNERSHIP and moves"),
        ];

        let found = segments_matching_topic(&segments, "ownership");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].start_time, 0.0);
        assert_eq!(found[1].start_time, 10.0);

        assert!(segments_matching_topic(&segments, "lifetimes").is_empty());
    }

    #[test]
    fn test_segment_json_shape() {
        let segment: TimestampedSegment =
            serde_json::from_str(r#"{"start_time": 1.5, "end_time": 3.0, "text": "hi"}"#).unwrap();
        assert_eq!(segment, TimestampedSegment::new(1.5, 3.0, "hi"));
        assert_eq!(segment.duration(), 1.5);
    }
}
