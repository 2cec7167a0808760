//! Intake session controller and backend API client
//!
//! Wires the transport, form engine and persistence crates into one
//! session loop, and exposes the HTTP client used to hand the finished
//! record to the backend.

pub mod http;
pub mod session;

use thiserror::Error;

pub use http::{CsrfTokenProvider, IntakeApiClient, NoCsrfToken, StaticCsrfToken};
pub use session::SessionController;

/// Failures surfaced by the session layer
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] voice_intake_transport::TransportError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Persistence(#[from] voice_intake_persistence::PersistenceError),

    #[error(transparent)]
    Audio(#[from] voice_intake_core::AudioError),

    #[error(transparent)]
    Config(#[from] voice_intake_config::ConfigError),
}
