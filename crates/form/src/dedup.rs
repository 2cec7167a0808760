//! Duplicate suppression
//!
//! The upstream service occasionally re-delivers a transcript or fires the
//! same tool call twice in quick succession. Two small windowed filters
//! absorb both without touching anything outside their window.
//!
//! Methods take an explicit `Instant` so tests can drive time directly.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Single-slot filter for repeated user utterances
///
/// Only the most recent accepted utterance is remembered; the window is
/// measured from that acceptance, so suppressed repeats do not extend it
/// and a genuine re-statement passes once the window elapses.
#[derive(Debug)]
pub struct UtteranceDedup {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl UtteranceDedup {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns true if the utterance should be processed
    pub fn check(&mut self, text: &str, now: Instant) -> bool {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return false;
        }

        if let Some((last_text, last_at)) = &self.last {
            if *last_text == normalized && now.duration_since(*last_at) < self.window {
                return false;
            }
        }
        self.last = Some((normalized, now));
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Keyed filter for repeated field-save tool calls
///
/// Keys are `field::value` with the field lowercased and both sides
/// trimmed, so cosmetic differences in the duplicate call still collide.
/// A suppressed call refreshes its timestamp. The map is cleared on every
/// turn boundary and on session reset.
#[derive(Debug)]
pub struct ToolCallDedup {
    window: Duration,
    seen: HashMap<String, Instant>,
}

impl ToolCallDedup {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    fn key(field: &str, value: &str) -> String {
        format!("{}::{}", field.trim().to_lowercase(), value.trim())
    }

    /// Returns true if the tool call should be processed
    pub fn check(&mut self, field: &str, value: &str, now: Instant) -> bool {
        let key = Self::key(field, value);
        let fresh = match self.seen.get(&key) {
            Some(seen_at) => now.duration_since(*seen_at) >= self.window,
            None => true,
        };
        self.seen.insert(key, now);
        fresh
    }

    /// Forget everything, called at turn boundaries and on disconnect
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(2_000);
    const TOOL_WINDOW: Duration = Duration::from_millis(200);

    #[test]
    fn test_utterance_duplicate_suppressed() {
        let mut dedup = UtteranceDedup::new(WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("I have a headache", t0));
        assert!(!dedup.check("I have a headache", t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_utterance_normalization() {
        let mut dedup = UtteranceDedup::new(WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("Hello There", t0));
        assert!(!dedup.check("  hello there  ", t0 + Duration::from_millis(100)));
    }

    #[test]
    fn test_utterance_passes_after_window() {
        let mut dedup = UtteranceDedup::new(WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("again", t0));
        assert!(dedup.check("again", t0 + WINDOW));
    }

    #[test]
    fn test_utterance_window_measured_from_acceptance() {
        let mut dedup = UtteranceDedup::new(WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("stuck", t0));
        // Suppressed repeat does not move the window forward
        assert!(!dedup.check("stuck", t0 + Duration::from_millis(1_500)));
        // 2.1s after the acceptance: passes despite the repeat at 1.5s
        assert!(dedup.check("stuck", t0 + Duration::from_millis(2_100)));
    }

    #[test]
    fn test_utterance_single_slot() {
        let mut dedup = UtteranceDedup::new(WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("first", t0));
        assert!(dedup.check("second", t0 + Duration::from_millis(10)));
        // "first" was evicted by "second"
        assert!(dedup.check("first", t0 + Duration::from_millis(20)));
    }

    #[test]
    fn test_empty_utterance_dropped() {
        let mut dedup = UtteranceDedup::new(WINDOW);
        assert!(!dedup.check("   ", Instant::now()));
    }

    #[test]
    fn test_tool_call_duplicate_suppressed() {
        let mut dedup = ToolCallDedup::new(TOOL_WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("full_name", "Jane Roe", t0));
        assert!(!dedup.check("full_name", "Jane Roe", t0 + Duration::from_millis(50)));
        // Different value is a different key
        assert!(dedup.check("full_name", "Joan Roe", t0 + Duration::from_millis(60)));
    }

    #[test]
    fn test_tool_call_key_normalization() {
        let mut dedup = ToolCallDedup::new(TOOL_WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("Full_Name ", " Jane Roe ", t0));
        assert!(!dedup.check("full_name", "Jane Roe", t0 + Duration::from_millis(10)));
    }

    #[test]
    fn test_tool_call_suppression_refreshes_timestamp() {
        let mut dedup = ToolCallDedup::new(TOOL_WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("dob", "1990-07-04", t0));
        assert!(!dedup.check("dob", "1990-07-04", t0 + Duration::from_millis(150)));
        // 250ms after t0 but 100ms after the refresh
        assert!(!dedup.check("dob", "1990-07-04", t0 + Duration::from_millis(250)));
        assert!(dedup.check("dob", "1990-07-04", t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_tool_call_clear_on_turn_boundary() {
        let mut dedup = ToolCallDedup::new(TOOL_WINDOW);
        let t0 = Instant::now();
        assert!(dedup.check("gender", "Female", t0));
        dedup.clear();
        assert!(dedup.check("gender", "Female", t0 + Duration::from_millis(1)));
    }
}
