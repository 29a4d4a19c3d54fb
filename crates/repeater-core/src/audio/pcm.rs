//! PCM16 mono buffers and the minimal WAV container
//!
//! A [`PcmBuffer`] owns little-endian signed 16-bit mono samples at a fixed
//! sample rate. Buffers are produced by the synthesizer, handed to a playback
//! sink by value, and never reused afterwards.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Size of the canonical PCM WAV header (RIFF + fmt + data chunk headers)
pub const WAV_HEADER_LEN: usize = 44;

/// Bytes per sample for PCM16
const BYTES_PER_SAMPLE: usize = 2;

/// Errors raised while assembling or materializing PCM audio
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Failed to write WAV file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sample rate mismatch: expected {expected}, got {actual}")]
    SampleRateMismatch { expected: u32, actual: u32 },
}

/// Owned buffer of PCM16 little-endian mono samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    sample_rate: u32,
    bytes: Vec<u8>,
}

impl PcmBuffer {
    /// Create an empty buffer at the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bytes: Vec::new(),
        }
    }

    /// Create an empty buffer with room for `samples` samples
    pub fn with_capacity(sample_rate: u32, samples: usize) -> Self {
        Self {
            sample_rate,
            bytes: Vec::with_capacity(samples * BYTES_PER_SAMPLE),
        }
    }

    /// Build a buffer from signed 16-bit samples
    pub fn from_samples(sample_rate: u32, samples: &[i16]) -> Self {
        let mut buffer = Self::with_capacity(sample_rate, samples.len());
        for &sample in samples {
            buffer.push_sample(sample);
        }
        buffer
    }

    /// Append one sample (little-endian)
    pub fn push_sample(&mut self, sample: i16) {
        self.bytes.extend_from_slice(&sample.to_le_bytes());
    }

    /// Append `count` zero samples
    pub fn push_silence(&mut self, count: usize) {
        self.bytes.resize(self.bytes.len() + count * BYTES_PER_SAMPLE, 0);
    }

    /// Append another buffer without resampling or re-timing it
    ///
    /// # Errors
    /// Returns [`SynthesisError::SampleRateMismatch`] if the rates differ.
    pub fn append(&mut self, other: &PcmBuffer) -> Result<(), SynthesisError> {
        if other.sample_rate != self.sample_rate {
            return Err(SynthesisError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: other.sample_rate,
            });
        }
        self.bytes.extend_from_slice(&other.bytes);
        Ok(())
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples in the buffer
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_SAMPLE
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw little-endian bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Iterate over the samples as `i16`
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
    }

    /// Samples normalized to -1.0..1.0
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples().map(|s| s as f32 / 32768.0).collect()
    }

    /// Exact playback duration at the buffer's sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = self.sample_count() as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Playback duration in whole milliseconds (rounded down)
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.sample_count() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Number of samples for a segment of `duration_ms` at `sample_rate`
///
/// Always `floor(sample_rate * duration_ms / 1000)`, computed in integers so
/// consecutive segments never accumulate fractional drift.
pub fn samples_for_duration(sample_rate: u32, duration_ms: u32) -> usize {
    (sample_rate as u64 * duration_ms as u64 / 1000) as usize
}

/// Serialize a buffer as a mono 16-bit PCM WAV file image
///
/// The output is the canonical 44-byte header (RIFF/WAVE, `fmt ` and `data`
/// chunks) followed by the sample bytes. No compression, no metadata.
pub fn write_wav(buffer: &PcmBuffer) -> Vec<u8> {
    let data_len = u32::try_from(buffer.bytes.len()).unwrap_or(u32::MAX);
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = buffer.sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + buffer.bytes.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36u32.saturating_add(data_len)).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(&buffer.bytes);
    out
}

/// Materialize a buffer as a WAV file on disk
///
/// # Errors
/// Returns [`SynthesisError::Io`] if the file cannot be created or written.
pub fn write_wav_file(path: &Path, buffer: &PcmBuffer) -> Result<(), SynthesisError> {
    let io_err = |source| SynthesisError::Io {
        path: path.display().to_string(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&write_wav(buffer)).map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    tracing::debug!(
        path = %path.display(),
        samples = buffer.sample_count(),
        "wav_written"
    );
    Ok(())
}
