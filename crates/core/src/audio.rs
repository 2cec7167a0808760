//! Audio codec for the streaming path
//!
//! Outbound: capture-rate f32 samples are box-filter downsampled to the wire
//! rate, noise-gated, quantized to PCM16 and base64 framed. Inbound: base64
//! PCM16 chunks are decoded to f32 with a soft-knee limiter, and scheduled
//! for gapless playback against a monotonic cursor.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AudioError;

/// PCM16 normalization divisor (PCM16 -> f32)
const PCM16_NORMALIZE: f32 = 32768.0;

/// PCM16 scaling multiplier for positive samples (f32 -> PCM16)
const PCM16_SCALE_POS: f32 = 32767.0;

/// PCM16 scaling multiplier for negative samples (f32 -> PCM16)
const PCM16_SCALE_NEG: f32 = 32768.0;

/// Samples with magnitude below this are zeroed before quantization
const NOISE_GATE: f32 = 0.001;

/// Soft-knee limiter threshold for decoded playback samples
const KNEE_THRESHOLD: f32 = 0.8;

/// Gain applied to the portion of a sample above the knee
const KNEE_RATIO: f32 = 0.2;

/// Wire sample rate assumed when the mime type carries no rate parameter
pub const DEFAULT_WIRE_RATE: u32 = 16000;

static MIME_RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"rate=(\d+)").unwrap());

/// Extract the sample rate from a mime type such as `audio/pcm;rate=24000`
pub fn rate_from_mime(mime: &str) -> u32 {
    MIME_RATE
        .captures(mime)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_WIRE_RATE)
}

/// Box-filter downsample from `input_rate` to `output_rate`
///
/// Each output sample is the mean of the input window it covers, which
/// doubles as a crude low-pass filter. Windows are delimited by rounded
/// positions so the full input is consumed without resampling artifacts at
/// non-integer ratios.
pub fn downsample(
    samples: &[f32],
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>, AudioError> {
    if samples.is_empty() {
        return Err(AudioError::EmptyBuffer);
    }
    if output_rate > input_rate {
        return Err(AudioError::UpsampleUnsupported {
            input: input_rate,
            output: output_rate,
        });
    }
    if output_rate == input_rate {
        return Ok(samples.to_vec());
    }

    let ratio = input_rate as f64 / output_rate as f64;
    let new_len = (samples.len() as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(new_len);

    let mut window_start = 0usize;
    for i in 0..new_len {
        let window_end = (((i + 1) as f64) * ratio).round() as usize;
        let window_end = window_end.min(samples.len());

        let mut accum = 0.0f32;
        let mut count = 0usize;
        for &s in &samples[window_start.min(samples.len())..window_end] {
            accum += s;
            count += 1;
        }
        out.push(if count > 0 { accum / count as f32 } else { 0.0 });
        window_start = window_end;
    }

    Ok(out)
}

/// Quantize f32 samples to PCM16 bytes (little-endian)
///
/// The noise gate zeroes near-silent samples so the wire stream compresses
/// to silence between utterances. Negative samples use the full -32768
/// range, positive samples 32767.
pub fn quantize_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let gated = if sample.abs() < NOISE_GATE { 0.0 } else { sample };
        let clamped = gated.clamp(-1.0, 1.0);
        let pcm = if clamped < 0.0 {
            (clamped * PCM16_SCALE_NEG) as i16
        } else {
            (clamped * PCM16_SCALE_POS) as i16
        };
        bytes.extend_from_slice(&pcm.to_le_bytes());
    }
    bytes
}

/// Encode a capture buffer into a base64 wire frame
pub fn encode_frame(
    samples: &[f32],
    capture_rate: u32,
    wire_rate: u32,
) -> Result<String, AudioError> {
    let downsampled = downsample(samples, capture_rate, wire_rate)?;
    Ok(BASE64.encode(quantize_pcm16(&downsampled)))
}

/// A decoded inbound audio chunk ready for playback
#[derive(Debug, Clone)]
pub struct DecodedChunk {
    /// Playback samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate parsed from the chunk's mime type
    pub sample_rate: u32,
    /// Chunk duration at `sample_rate`
    pub duration: Duration,
}

/// Decode a base64 PCM16 chunk into playback samples
///
/// Samples above the knee threshold are compressed toward the threshold so
/// hot synthesis output does not clip on the output device.
pub fn decode_chunk(data: &str, mime: &str) -> Result<DecodedChunk, AudioError> {
    let bytes = BASE64.decode(data)?;
    if bytes.len() % 2 != 0 {
        return Err(AudioError::TruncatedPcm(bytes.len()));
    }

    let sample_rate = rate_from_mime(mime);
    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|chunk| {
            let raw = i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / PCM16_NORMALIZE;
            soft_knee(raw)
        })
        .collect();

    let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64);
    Ok(DecodedChunk {
        samples,
        sample_rate,
        duration,
    })
}

fn soft_knee(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= KNEE_THRESHOLD {
        sample
    } else {
        let compressed = KNEE_THRESHOLD + (magnitude - KNEE_THRESHOLD) * KNEE_RATIO;
        compressed.copysign(sample)
    }
}

/// Monotonic playback scheduler
///
/// Chunks arrive faster than real time; each is scheduled at the later of
/// "now" and the end of the previously scheduled chunk, so playback is
/// gapless and never overlaps. A chunk that fails to decode must not touch
/// the cursor, which falls out naturally since scheduling happens only after
/// a successful decode.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    cursor: Option<Instant>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a playback slot for a chunk of `duration`, returning its
    /// start time
    pub fn schedule(&mut self, now: Instant, duration: Duration) -> Instant {
        let start = match self.cursor {
            Some(cursor) if cursor > now => cursor,
            _ => now,
        };
        self.cursor = Some(start + duration);
        start
    }

    /// Drop any pending schedule, e.g. when playback is torn down
    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// End of the last scheduled chunk, if any
    pub fn cursor(&self) -> Option<Instant> {
        self.cursor
    }
}
