//! Centralized business constants
//!
//! Single source of truth for the timing, retry and dedup values used across
//! the codebase. Settings defaults pull from here so a value changed in one
//! place stays consistent everywhere.

/// Session timing (milliseconds unless noted)
pub mod timeouts {
    /// Abort a connect attempt stuck in the handshake after this long
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Silence on the conversation before the stall watchdog nudges the
    /// model
    pub const CONVERSATION_STALL_MS: u64 = 30_000;
}

/// Reconnection backoff schedule
pub mod reconnect {
    /// Give up after this many consecutive failed attempts
    pub const MAX_ATTEMPTS: u32 = 100;

    /// First retry delay (ms); grows geometrically from here
    pub const BASE_DELAY_MS: u64 = 3_500;

    /// Growth factor per attempt
    pub const GROWTH_FACTOR: f64 = 1.5;

    /// Delay ceiling (ms)
    pub const MAX_DELAY_MS: u64 = 30_000;

    /// Total jitter band as a fraction of the delay (0.2 = +/-10%)
    pub const JITTER_FRACTION: f64 = 0.2;
}

/// Duplicate suppression windows
pub mod dedup {
    /// Identical user utterances inside this window are dropped (ms)
    pub const UTTERANCE_WINDOW_MS: u64 = 2_000;

    /// Identical field/value tool calls inside this window are dropped (ms)
    pub const TOOL_CALL_WINDOW_MS: u64 = 200;
}

/// Audio wire format
pub mod audio {
    /// Sample rate sent upstream
    pub const WIRE_SAMPLE_RATE: u32 = 16_000;

    /// Mime type attached to outbound audio frames
    pub const WIRE_MIME: &str = "audio/pcm;rate=16000";

    /// Default capture rate assumed when the host does not report one
    pub const DEFAULT_CAPTURE_RATE: u32 = 48_000;
}

/// Session recovery storage
pub mod session {
    /// Fixed key (file stem) the recovery snapshot is stored under
    pub const RECOVERY_KEY: &str = "voice_flow_recovery_session";

    /// Snapshots older than this are discarded on load (seconds)
    pub const RECOVERY_TTL_SECS: u64 = 3_600;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_bounds_ordered() {
        assert!(reconnect::BASE_DELAY_MS < reconnect::MAX_DELAY_MS);
        assert!(reconnect::GROWTH_FACTOR > 1.0);
        assert!(reconnect::MAX_ATTEMPTS >= 1);
    }

    #[test]
    fn test_dedup_windows_positive() {
        assert!(dedup::UTTERANCE_WINDOW_MS > 0);
        assert!(dedup::TOOL_CALL_WINDOW_MS > 0);
        assert!(dedup::TOOL_CALL_WINDOW_MS < dedup::UTTERANCE_WINDOW_MS);
    }

    #[test]
    fn test_wire_mime_carries_rate() {
        assert!(audio::WIRE_MIME.contains(&audio::WIRE_SAMPLE_RATE.to_string()));
    }
}
