//! Deterministic tone and silence rendering
//!
//! Every segment is rendered independently with its own exact sample count
//! (`floor(sample_rate * duration_ms / 1000)`) and segments are concatenated
//! as-is, so a sequence lasts exactly the sum of its configured durations.

use super::pcm::{samples_for_duration, PcmBuffer, SynthesisError};
use std::f64::consts::PI;

/// Full-scale PCM16 amplitude used for rendering
const FULL_SCALE: f64 = 32767.0;

/// One sine tone: frequency, duration, and linear amplitude (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f64,
    pub duration_ms: u32,
    pub amplitude: f64,
}

impl ToneSpec {
    pub fn new(frequency_hz: f64, duration_ms: u32, amplitude: f64) -> Self {
        Self {
            frequency_hz,
            duration_ms,
            amplitude,
        }
    }
}

/// A piece of a tone sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Tone(ToneSpec),
    Silence { duration_ms: u32 },
}

impl Segment {
    /// Configured duration of the segment
    pub fn duration_ms(&self) -> u32 {
        match self {
            Segment::Tone(spec) => spec.duration_ms,
            Segment::Silence { duration_ms } => *duration_ms,
        }
    }
}

/// Render a sine tone
///
/// Sample `i` is `round(sin(2π·f·i/sample_rate) · amplitude · 32767)`.
/// Amplitude is clamped to 0.0..=1.0. Identical inputs always produce
/// byte-identical output.
///
/// # Example
/// ```
/// use repeater_core::audio::synth::{render_tone, ToneSpec};
///
/// let pcm = render_tone(&ToneSpec::new(1000.0, 100, 0.5), 48000);
/// assert_eq!(pcm.sample_count(), 4800);
/// ```
pub fn render_tone(spec: &ToneSpec, sample_rate: u32) -> PcmBuffer {
    let count = samples_for_duration(sample_rate, spec.duration_ms);
    let amplitude = spec.amplitude.clamp(0.0, 1.0) * FULL_SCALE;
    let step = 2.0 * PI * spec.frequency_hz / sample_rate as f64;

    let mut buffer = PcmBuffer::with_capacity(sample_rate, count);
    for i in 0..count {
        let value = ((step * i as f64).sin() * amplitude).round();
        buffer.push_sample(value.clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }
    buffer
}

/// Render two simultaneous sines, each at half of `amplitude`
///
/// This is the DTMF signalling waveform (low group + high group tone).
pub fn render_dual_tone(
    low_hz: f64,
    high_hz: f64,
    duration_ms: u32,
    amplitude: f64,
    sample_rate: u32,
) -> PcmBuffer {
    let count = samples_for_duration(sample_rate, duration_ms);
    let amplitude = amplitude.clamp(0.0, 1.0) * FULL_SCALE / 2.0;
    let low_step = 2.0 * PI * low_hz / sample_rate as f64;
    let high_step = 2.0 * PI * high_hz / sample_rate as f64;

    let mut buffer = PcmBuffer::with_capacity(sample_rate, count);
    for i in 0..count {
        let t = i as f64;
        let value = (((low_step * t).sin() + (high_step * t).sin()) * amplitude).round();
        buffer.push_sample(value.clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }
    buffer
}

/// Render an all-zero segment
pub fn render_silence(duration_ms: u32, sample_rate: u32) -> PcmBuffer {
    let mut buffer = PcmBuffer::new(sample_rate);
    buffer.push_silence(samples_for_duration(sample_rate, duration_ms));
    buffer
}

/// Concatenate independently rendered buffers into one
///
/// Buffers are joined sample for sample; nothing is resampled or re-timed.
///
/// # Errors
/// Returns [`SynthesisError::SampleRateMismatch`] if the rates differ.
pub fn concat(buffers: &[PcmBuffer]) -> Result<PcmBuffer, SynthesisError> {
    let Some(first) = buffers.first() else {
        return Ok(PcmBuffer::new(crate::DEFAULT_SAMPLE_RATE));
    };
    let total = buffers.iter().map(PcmBuffer::sample_count).sum();
    let mut out = PcmBuffer::with_capacity(first.sample_rate(), total);
    for buffer in buffers {
        out.append(buffer)?;
    }
    Ok(out)
}

/// Render one segment
pub fn render_segment(segment: &Segment, sample_rate: u32) -> PcmBuffer {
    match segment {
        Segment::Tone(spec) => render_tone(spec, sample_rate),
        Segment::Silence { duration_ms } => render_silence(*duration_ms, sample_rate),
    }
}

/// Render a list of segments into one continuous buffer
pub fn render_segments(segments: &[Segment], sample_rate: u32) -> PcmBuffer {
    let total: usize = segments
        .iter()
        .map(|s| samples_for_duration(sample_rate, s.duration_ms()))
        .sum();

    let mut out = PcmBuffer::with_capacity(sample_rate, total);
    for segment in segments {
        // Same sample rate by construction
        let _ = out.append(&render_segment(segment, sample_rate));
    }
    out
}

/// Sum of the configured durations of a segment list
pub fn total_duration_ms(segments: &[Segment]) -> u32 {
    segments.iter().map(Segment::duration_ms).sum()
}
