//! HTTP client for the intake backend
//!
//! Three endpoints: final record submission, transcript archival, and
//! clearing the server-side session after a completed intake. All POSTs
//! carry the CSRF token the host page was issued.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use voice_intake_core::{ConversationLog, TurnRole};

use crate::ClientError;

/// Source of the CSRF token attached to every mutating request
pub trait CsrfTokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Fixed token, handed over by the embedding page at startup
pub struct StaticCsrfToken(pub String);

impl CsrfTokenProvider for StaticCsrfToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// No token; for test servers that skip CSRF checks
pub struct NoCsrfToken;

impl CsrfTokenProvider for NoCsrfToken {
    fn token(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Serialize)]
struct TranscriptMessage<'a> {
    role: &'a str,
    content: &'a str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
struct TranscriptPayload<'a> {
    title: String,
    messages: Vec<TranscriptMessage<'a>>,
    started_at: chrono::DateTime<chrono::Utc>,
    ended_at: chrono::DateTime<chrono::Utc>,
    message_count: usize,
}

/// Client for the intake HTTP API
pub struct IntakeApiClient {
    http: reqwest::Client,
    base: String,
    csrf: Arc<dyn CsrfTokenProvider>,
}

impl IntakeApiClient {
    pub fn new(base: impl Into<String>, csrf: Arc<dyn CsrfTokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            csrf,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.post(format!("{}{}", self.base, path));
        if let Some(token) = self.csrf.token() {
            req = req.header("X-CSRFToken", token);
        }
        req
    }

    /// Submit the prevalidated record
    pub async fn submit_record(&self, payload: &Map<String, Value>) -> Result<(), ClientError> {
        self.post("/api/appointments/")
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Archive the session transcript
    pub async fn save_transcript(&self, log: &ConversationLog) -> Result<(), ClientError> {
        let title = log
            .turns()
            .iter()
            .find(|t| t.role == TurnRole::User)
            .map(|t| t.content.chars().take(60).collect())
            .unwrap_or_else(|| "Patient intake session".to_string());

        let payload = TranscriptPayload {
            title,
            messages: log
                .turns()
                .iter()
                .map(|t| TranscriptMessage {
                    role: t.role.as_str(),
                    content: &t.content,
                    timestamp: t.timestamp,
                })
                .collect(),
            started_at: log.started_at(),
            ended_at: chrono::Utc::now(),
            message_count: log.len(),
        };

        self.post("/save/")
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Drop the server-side session state after a completed intake
    pub async fn clear_server_session(&self) -> Result<(), ClientError> {
        self.post("/clear-voice-flow-session/")
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
