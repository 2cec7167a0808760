//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{audio, dedup, reconnect, session, timeouts};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Upstream service endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Reconnection backoff
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Duplicate suppression windows
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Session timing and recovery
    #[serde(default)]
    pub session: SessionConfig,

    /// Audio capture / wire format
    #[serde(default)]
    pub audio: AudioConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Upstream endpoints and model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Realtime WebSocket endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Base URL for the intake HTTP API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model identifier sent in the setup message
    #[serde(default = "default_model")]
    pub model: String,

    /// Voice identifier sent in the setup message
    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws/voice-flow/".to_string()
}
fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash-live-001".to_string()
}
fn default_voice() -> String {
    "Aoede".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_base: default_api_base(),
            model: default_model(),
            voice: default_voice(),
        }
    }
}

/// Reconnection backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    reconnect::MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    reconnect::BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    reconnect::MAX_DELAY_MS
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Duplicate suppression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_utterance_window_ms")]
    pub utterance_window_ms: u64,

    #[serde(default = "default_tool_call_window_ms")]
    pub tool_call_window_ms: u64,
}

fn default_utterance_window_ms() -> u64 {
    dedup::UTTERANCE_WINDOW_MS
}
fn default_tool_call_window_ms() -> u64 {
    dedup::TOOL_CALL_WINDOW_MS
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            utterance_window_ms: default_utterance_window_ms(),
            tool_call_window_ms: default_tool_call_window_ms(),
        }
    }
}

/// Session timing and recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Handshake timeout (ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Conversation stall watchdog (ms)
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    /// Directory the recovery snapshot is written under
    #[serde(default = "default_recovery_dir")]
    pub recovery_dir: String,

    /// Snapshot time-to-live (seconds)
    #[serde(default = "default_recovery_ttl_secs")]
    pub recovery_ttl_secs: u64,
}

fn default_connect_timeout_ms() -> u64 {
    timeouts::CONNECT_TIMEOUT_MS
}
fn default_stall_timeout_ms() -> u64 {
    timeouts::CONVERSATION_STALL_MS
}
fn default_recovery_dir() -> String {
    ".voice-intake".to_string()
}
fn default_recovery_ttl_secs() -> u64 {
    session::RECOVERY_TTL_SECS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            stall_timeout_ms: default_stall_timeout_ms(),
            recovery_dir: default_recovery_dir(),
            recovery_ttl_secs: default_recovery_ttl_secs(),
        }
    }
}

/// Audio capture and wire configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Capture sample rate reported by the host (Hz)
    #[serde(default = "default_capture_rate")]
    pub capture_rate: u32,

    /// Sample rate sent upstream (Hz)
    #[serde(default = "default_wire_rate")]
    pub wire_rate: u32,
}

fn default_capture_rate() -> u32 {
    audio::DEFAULT_CAPTURE_RATE
}
fn default_wire_rate() -> u32 {
    audio::WIRE_SAMPLE_RATE
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_rate: default_capture_rate(),
            wire_rate: default_wire_rate(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of the human format
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.ws_url.starts_with("ws://") && !self.server.ws_url.starts_with("wss://") {
            return Err(ConfigError::InvalidValue {
                field: "server.ws_url".to_string(),
                message: format!("expected ws:// or wss:// URL, got '{}'", self.server.ws_url),
            });
        }

        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.base_delay_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.base_delay_ms".to_string(),
                message: format!(
                    "base delay {}ms exceeds ceiling {}ms",
                    self.reconnect.base_delay_ms, self.reconnect.max_delay_ms
                ),
            });
        }

        if self.audio.wire_rate == 0 || self.audio.capture_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audio".to_string(),
                message: "sample rates must be positive".to_string(),
            });
        }

        if self.audio.wire_rate > self.audio.capture_rate {
            return Err(ConfigError::InvalidValue {
                field: "audio.wire_rate".to_string(),
                message: format!(
                    "wire rate {} exceeds capture rate {}",
                    self.audio.wire_rate, self.audio.capture_rate
                ),
            });
        }

        if self.session.connect_timeout_ms == 0 || self.session.stall_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session".to_string(),
                message: "timeouts must be positive".to_string(),
            });
        }

        if self.environment.is_production() && self.server.ws_url.starts_with("ws://") {
            tracing::warn!(
                "ws_url is plaintext in production: {}",
                self.server.ws_url
            );
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (VOICE_INTAKE__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_INTAKE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.reconnect.max_attempts, 100);
        assert_eq!(settings.dedup.utterance_window_ms, 2_000);
    }

    #[test]
    fn test_rejects_non_ws_url() {
        let mut settings = Settings::default();
        settings.server.ws_url = "http://localhost:8000".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut settings = Settings::default();
        settings.reconnect.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_delays() {
        let mut settings = Settings::default();
        settings.reconnect.base_delay_ms = 60_000;
        settings.reconnect.max_delay_ms = 30_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_wire_rate_above_capture() {
        let mut settings = Settings::default();
        settings.audio.capture_rate = 8_000;
        assert!(settings.validate().is_err());
    }
}
