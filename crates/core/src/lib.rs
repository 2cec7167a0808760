//! Core types for the voice intake client
//!
//! Foundational pieces shared by every other crate:
//! - PCM16 audio codec and playback scheduling
//! - Conversation transcript types
//! - Seam traits for UI and audio output surfaces
//! - Audio error types

pub mod audio;
pub mod conversation;
pub mod error;
pub mod traits;

pub use audio::{
    decode_chunk, downsample, encode_frame, quantize_pcm16, rate_from_mime, DecodedChunk,
    PlaybackClock, DEFAULT_WIRE_RATE,
};
pub use conversation::{ConversationLog, Turn, TurnRole};
pub use error::AudioError;
pub use traits::{
    AudioOutput, LinkStatus, NoopAudioOutput, NoopUi, SectionStatus, SectionView, UiSink,
};
