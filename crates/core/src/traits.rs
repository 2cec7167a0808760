//! Seam traits for the host surfaces the intake engine drives
//!
//! The engine itself is headless; rendering and audio output are behind
//! these traits so the same session logic runs under a real frontend or a
//! test harness.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::audio::DecodedChunk;
use crate::conversation::Turn;

/// Connection status surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// Completion state of a checklist section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Pending,
    PartiallyCompleted,
    Completed,
}

/// One checklist row as shown to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionView {
    pub title: String,
    pub description: String,
    pub status: SectionStatus,
    pub filled: usize,
    pub total: usize,
}

/// Rendering surface for the intake UI
#[async_trait]
pub trait UiSink: Send + Sync {
    /// Connection status changed
    async fn connection_status(&self, status: LinkStatus);

    /// Agent started or stopped producing audio
    async fn speaking_indicator(&self, active: bool);

    /// A field was written to the record (fires on unchanged saves too)
    async fn field_saved(&self, field: &str, value: &str);

    /// Checklist recomputed after a record change
    async fn checklist_updated(&self, sections: &[SectionView]);

    /// A transcript turn was appended
    async fn transcript(&self, turn: &Turn);

    /// Blocking notice the user must see (quota exhaustion etc.)
    async fn popup(&self, message: &str);

    /// Intake complete; hand off to the review surface
    async fn open_review(&self);
}

/// Playback surface for inbound agent audio
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play a decoded chunk starting at `start_at`
    async fn play(&self, chunk: DecodedChunk, start_at: Instant);

    /// Discard anything queued and stop output
    async fn stop(&self);
}

/// No-op UI for tests and headless runs
#[derive(Debug, Default)]
pub struct NoopUi;

#[async_trait]
impl UiSink for NoopUi {
    async fn connection_status(&self, _status: LinkStatus) {}
    async fn speaking_indicator(&self, _active: bool) {}
    async fn field_saved(&self, _field: &str, _value: &str) {}
    async fn checklist_updated(&self, _sections: &[SectionView]) {}
    async fn transcript(&self, _turn: &Turn) {}
    async fn popup(&self, _message: &str) {}
    async fn open_review(&self) {}
}

/// No-op audio output for tests and headless runs
#[derive(Debug, Default)]
pub struct NoopAudioOutput;

#[async_trait]
impl AudioOutput for NoopAudioOutput {
    async fn play(&self, _chunk: DecodedChunk, _start_at: Instant) {}
    async fn stop(&self) {}
}
