//! Links a generated answer back to the transcript segments it drew on.
//!
//! A segment is cited when any of its whitespace-separated words longer than
//! `min_word_length` characters occurs, case-insensitively, anywhere in the
//! answer. Matching is by substring, so "program" in a segment also matches
//! "programming" in the answer and punctuation stays attached to words. There
//! is no scoring: the first `max_matches` cited segments are returned in
//! transcript order. This favours recall and will cite segments that merely
//! share a common long word with the answer.

use super::TimestampedSegment;
use crate::config::TimestampSettings;

/// Word-overlap matcher between answers and transcript segments.
#[derive(Debug, Clone, Copy)]
pub struct TimestampMatcher {
    min_word_length: usize,
    max_matches: usize,
}

impl Default for TimestampMatcher {
    fn default() -> Self {
        Self {
            min_word_length: 4,
            max_matches: 5,
        }
    }
}

impl TimestampMatcher {
    pub fn new(min_word_length: usize, max_matches: usize) -> Self {
        Self {
            min_word_length,
            max_matches,
        }
    }

    pub fn from_settings(settings: &TimestampSettings) -> Self {
        Self::new(settings.min_word_length, settings.max_matches)
    }

    /// Select the segments the answer refers to, preserving segment order.
    pub fn find_matches(&self, answer: &str, segments: &[TimestampedSegment]) -> Vec<TimestampedSegment> {
        let answer = answer.to_lowercase();
        if answer.is_empty() {
            return Vec::new();
        }

        segments
            .iter()
            .filter(|segment| self.is_referenced(&answer, segment))
            .take(self.max_matches)
            .cloned()
            .collect()
    }

    fn is_referenced(&self, answer_lower: &str, segment: &TimestampedSegment) -> bool {
        segment
            .text
            .to_lowercase()
            .split_whitespace()
            .filter(|word| word.chars().count() > self.min_word_length)
            .any(|word| answer_lower.contains(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, text: &str) -> TimestampedSegment {
        TimestampedSegment::new(start, end, text)
    }

    #[test]
    fn test_matches_long_shared_words() {
        let segments = vec![
            segment(0.0, 5.0, "Python programming language"),
            segment(5.0, 10.0, "Short"),
        ];

        let matches = TimestampMatcher::default().find_matches("python programming is great", &segments);
        assert_eq!(matches, vec![segments[0].clone()]);
    }

    #[test]
    fn test_no_long_words_no_matches() {
        let segments = vec![segment(0.0, 5.0, "abc")];
        let matches = TimestampMatcher::default().find_matches("xyz completely different", &segments);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_empty_answer() {
        let segments = vec![segment(0.0, 5.0, "something meaningful")];
        assert!(TimestampMatcher::default().find_matches("", &segments).is_empty());
    }

    #[test]
    fn test_words_must_be_strictly_longer_than_threshold() {
        // "rust" has four characters and never counts.
        let segments = vec![segment(0.0, 1.0, "rust rust"), segment(1.0, 2.0, "crates")];
        let matches = TimestampMatcher::default().find_matches("rust crates", &segments);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "crates");
    }

    #[test]
    fn test_substring_and_case_insensitive() {
        let segments = vec![segment(0.0, 1.0, "The PROGRAM starts")];
        let matches = TimestampMatcher::default().find_matches("Programming is fun", &segments);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_capped_at_first_five_in_order() {
        let segments: Vec<TimestampedSegment> = (0..8)
            .map(|i| segment(i as f64, i as f64 + 1.0, "shared keyword"))
            .collect();

        let matches = TimestampMatcher::default().find_matches("the keyword appears", &segments);
        assert_eq!(matches.len(), 5);
        let starts: Vec<f64> = matches.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_custom_limits() {
        let segments = vec![segment(0.0, 1.0, "cat"), segment(1.0, 2.0, "dog"), segment(2.0, 3.0, "cow")];
        let matcher = TimestampMatcher::new(2, 2);
        let matches = matcher.find_matches("cat dog cow", &segments);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].text, "dog");
    }
}
