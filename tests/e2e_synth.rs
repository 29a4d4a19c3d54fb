//! E2E tests for tone synthesis and the WAV container
//!
//! Rendered sequences are written to disk and read back with a standard WAV
//! reader to verify format, length and timing to the sample.

use approx::assert_relative_eq;
use repeater::audio::pcm::{write_wav, write_wav_file, WAV_HEADER_LEN};
use repeater::audio::sequence::{
    render_bbc_pips_sequence, render_confirmation_beep, render_kenwood_beep, BBC_PIPS_TOTAL_MS,
};
use repeater::audio::synth::{render_tone, ToneSpec};

/// Test that a rendered tone round-trips through a WAV file
#[test]
fn test_tone_wav_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");

    let pcm = render_tone(&ToneSpec::new(1000.0, 250, 0.7), 44100);
    write_wav_file(&path, &pcm).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.len() as usize, 11025);

    let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples, pcm.samples().collect::<Vec<_>>());
}

/// Test that the beacon is exactly 5.5 seconds of audio in one file
#[test]
fn test_bbc_pips_wav_duration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pips.wav");

    let (pcm, duration_ms) = render_bbc_pips_sequence(0.7, 48000);
    assert_eq!(duration_ms, BBC_PIPS_TOTAL_MS);
    assert_eq!(duration_ms, 5500);
    write_wav_file(&path, &pcm).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    let seconds = reader.duration() as f64 / reader.spec().sample_rate as f64;
    assert_relative_eq!(seconds, 5.5, epsilon = 1e-9);
}

/// Test that the beacon contains five short pips and one long pip
#[test]
fn test_bbc_pips_structure() {
    let sample_rate = 8000;
    let (pcm, _) = render_bbc_pips_sequence(0.7, sample_rate);
    let samples: Vec<i16> = pcm.samples().collect();

    // Tone/silence runs measured on 10ms blocks
    let block = (sample_rate / 100) as usize;
    let active: Vec<bool> = samples
        .chunks(block)
        .map(|c| c.iter().any(|&s| s.unsigned_abs() > 1000))
        .collect();

    let mut bursts = Vec::new();
    let mut run = 0;
    for &on in active.iter().chain(std::iter::once(&false)) {
        if on {
            run += 1;
        } else if run > 0 {
            bursts.push(run * 10);
            run = 0;
        }
    }
    assert_eq!(bursts, vec![100, 100, 100, 100, 100, 500]);
}

/// Test that the roger-beep length is the sum of its segments at any rate
#[test]
fn test_roger_beep_exact_length() {
    for &sample_rate in &[8000u32, 22050, 44100, 48000, 96000] {
        let pcm = render_kenwood_beep(0.7, 300, sample_rate);
        let tone = (sample_rate as usize) * 100 / 1000;
        let pause = (sample_rate as usize) * 10 / 1000;
        assert_eq!(
            pcm.sample_count(),
            3 * tone + 2 * pause,
            "sample rate {}",
            sample_rate
        );
    }
}

/// Test the canonical 44-byte header layout
#[test]
fn test_wav_header_bytes() {
    let pcm = render_confirmation_beep(0.5, 16000);
    let wav = write_wav(&pcm);

    assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.as_bytes().len());
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..16], b"WAVEfmt ");
    assert_eq!(&wav[36..40], b"data");

    let u32_at = |i: usize| u32::from_le_bytes([wav[i], wav[i + 1], wav[i + 2], wav[i + 3]]);
    assert_eq!(u32_at(4) as usize, wav.len() - 8);
    assert_eq!(u32_at(24), 16000);
    assert_eq!(u32_at(28), 32000);
    assert_eq!(u32_at(40) as usize, pcm.as_bytes().len());
}

/// Test that the confirmation beep is tone, gap, tone
#[test]
fn test_confirmation_beep_timing() {
    let pcm = render_confirmation_beep(0.7, 48000);
    assert_eq!(pcm.duration_ms(), 250);

    let samples: Vec<i16> = pcm.samples().collect();
    let gap = &samples[4800..4800 + 2400];
    assert!(gap.iter().all(|&s| s == 0));
}
