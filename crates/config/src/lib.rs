//! Configuration, constants and the intake field schema
//!
//! - `settings`: layered runtime configuration (files + env vars)
//! - `constants`: centralized business constants
//! - `fields`: the declarative intake field table

pub mod constants;
pub mod fields;
pub mod settings;

use thiserror::Error;

pub use fields::{
    field_def, group_fields, next_unfilled, prerequisite_fields, FieldDef, FieldGroup, FormatRule,
    CONFIRMATION_REQUIRED, FIELDS, NOT_NEEDED,
};
pub use settings::{
    load_settings, AudioConfig, DedupConfig, ObservabilityConfig, ReconnectConfig,
    RuntimeEnvironment, ServerConfig, SessionConfig, Settings,
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying file/env source failed to load or parse
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A setting was present but semantically invalid
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
