//! Named tone patterns: Kenwood roger-beep, BBC pips beacon, confirmation beep
//!
//! Each pattern is rendered into ONE continuous buffer. Playing it with a
//! single playback call keeps the radio's VOX/PTT keyed for the whole
//! sequence; separate calls with gaps in between let VOX drop between tones.
//!
//! The renderers never play audio. They return the buffer together with its
//! exact playback duration so the caller can hold the transmit gate for it.

use super::pcm::PcmBuffer;
use super::synth::{render_segments, Segment, ToneSpec};

/// Kenwood roger-beep default tones, descending (Hz)
pub const KENWOOD_TONES_HZ: [f64; 3] = [1500.0, 1200.0, 1000.0];

/// Relative amplitude of each Kenwood tone
pub const KENWOOD_LEVELS: [f64; 3] = [1.0, 0.9, 0.8];

/// Pause between Kenwood tones
pub const KENWOOD_PAUSE_MS: u32 = 10;

/// BBC pips tone frequency
pub const PIP_FREQUENCY_HZ: f64 = 1000.0;

/// Short pip length
pub const SHORT_PIP_MS: u32 = 100;

/// Silence after each short pip
pub const PIP_GAP_MS: u32 = 900;

/// Number of short pips before the long one
pub const SHORT_PIP_COUNT: usize = 5;

/// Final long pip length
pub const LONG_PIP_MS: u32 = 500;

/// Total BBC pips sequence length: 5 × (100 + 900) + 500
pub const BBC_PIPS_TOTAL_MS: u32 =
    SHORT_PIP_COUNT as u32 * (SHORT_PIP_MS + PIP_GAP_MS) + LONG_PIP_MS;

/// Confirmation beep tone
const CONFIRM_FREQUENCY_HZ: f64 = 1000.0;
const CONFIRM_TONE_MS: u32 = 100;
const CONFIRM_GAP_MS: u32 = 50;

/// Segments of a Kenwood-style beep with custom tones
///
/// Each tone lasts `total_duration_ms / 3`, separated by a fixed 10ms pause,
/// at 100%, 90% and 80% of `volume`.
pub fn kenwood_segments(tones_hz: [f64; 3], volume: f64, total_duration_ms: u32) -> Vec<Segment> {
    let tone_ms = total_duration_ms / 3;
    let mut segments = Vec::with_capacity(5);

    for (i, (&freq, &level)) in tones_hz.iter().zip(KENWOOD_LEVELS.iter()).enumerate() {
        if i > 0 {
            segments.push(Segment::Silence {
                duration_ms: KENWOOD_PAUSE_MS,
            });
        }
        segments.push(Segment::Tone(ToneSpec::new(freq, tone_ms, volume * level)));
    }
    segments
}

/// Render the Kenwood triple-descending roger-beep with default tones
///
/// # Example
/// ```
/// use repeater_core::audio::sequence::render_kenwood_beep;
///
/// let pcm = render_kenwood_beep(0.7, 300, 48000);
/// // 3 × 100ms tones + 2 × 10ms pauses
/// assert_eq!(pcm.duration_ms(), 320);
/// ```
pub fn render_kenwood_beep(volume: f64, total_duration_ms: u32, sample_rate: u32) -> PcmBuffer {
    render_kenwood_beep_with(KENWOOD_TONES_HZ, volume, total_duration_ms, sample_rate)
}

/// Render a Kenwood-style beep with custom tones
pub fn render_kenwood_beep_with(
    tones_hz: [f64; 3],
    volume: f64,
    total_duration_ms: u32,
    sample_rate: u32,
) -> PcmBuffer {
    let segments = kenwood_segments(tones_hz, volume, total_duration_ms);
    render_segments(&segments, sample_rate)
}

/// Segments of the BBC pips: five short pips with gaps, then one long pip
pub fn bbc_pips_segments(tone_hz: f64, volume: f64) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(SHORT_PIP_COUNT * 2 + 1);
    for _ in 0..SHORT_PIP_COUNT {
        segments.push(Segment::Tone(ToneSpec::new(tone_hz, SHORT_PIP_MS, volume)));
        segments.push(Segment::Silence {
            duration_ms: PIP_GAP_MS,
        });
    }
    segments.push(Segment::Tone(ToneSpec::new(tone_hz, LONG_PIP_MS, volume)));
    segments
}

/// Render the BBC pips beacon as one buffer
///
/// Returns the buffer and its playback length in milliseconds. The length
/// is taken from the rendered samples, so at rates where a segment is not a
/// whole number of samples it can fall a millisecond short of
/// [`BBC_PIPS_TOTAL_MS`].
pub fn render_bbc_pips_sequence(volume: f64, sample_rate: u32) -> (PcmBuffer, u32) {
    render_bbc_pips_with(PIP_FREQUENCY_HZ, volume, sample_rate)
}

/// Render the BBC pips at a custom tone frequency
pub fn render_bbc_pips_with(tone_hz: f64, volume: f64, sample_rate: u32) -> (PcmBuffer, u32) {
    let segments = bbc_pips_segments(tone_hz, volume);
    let pcm = render_segments(&segments, sample_rate);
    let duration_ms = u32::try_from(pcm.duration_ms()).unwrap_or(u32::MAX);

    tracing::trace!(
        samples = pcm.sample_count(),
        duration_ms,
        "bbc_pips_rendered"
    );
    (pcm, duration_ms)
}

/// Render the two-beep acknowledgement played after an accepted command
pub fn render_confirmation_beep(volume: f64, sample_rate: u32) -> PcmBuffer {
    let tone = ToneSpec::new(CONFIRM_FREQUENCY_HZ, CONFIRM_TONE_MS, volume);
    let segments = [
        Segment::Tone(tone),
        Segment::Silence {
            duration_ms: CONFIRM_GAP_MS,
        },
        Segment::Tone(tone),
    ];
    render_segments(&segments, sample_rate)
}
