//! Conversation turns and the in-session transcript log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of the speaker for a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// Patient / caller speech
    User,
    /// Agent speech or text
    Assistant,
    /// Out-of-band instruction injected by the client
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single transcript turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnRole::System, content)
    }
}

/// Ordered transcript of the current intake session
///
/// Serializable as a whole so it can ride inside a recovery snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLog {
    started_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last user or assistant turn, skipping injected system messages
    pub fn last_spoken(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role != TurnRole::System)
    }

    /// Render the transcript as `role: content` lines
    ///
    /// Used when replaying prior context to the model after a reconnect.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(turn.role.as_str());
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}
