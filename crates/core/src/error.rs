//! Error types shared by the audio path

use thiserror::Error;

/// Errors produced while encoding or decoding audio chunks
#[derive(Debug, Error)]
pub enum AudioError {
    /// Base64 payload could not be decoded
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// PCM16 payload had an odd byte count
    #[error("truncated PCM16 payload ({0} bytes)")]
    TruncatedPcm(usize),

    /// Empty capture buffer submitted for encoding
    #[error("empty audio buffer")]
    EmptyBuffer,

    /// Target sample rate above the capture rate
    #[error("cannot upsample from {input} Hz to {output} Hz")]
    UpsampleUnsupported { input: u32, output: u32 },
}
