//! Audio processing module
//!
//! This module contains all audio-related functionality including:
//! - PCM16 buffers and the WAV container ([`pcm`])
//! - Sine and silence segment rendering ([`synth`])
//! - Roger-beep and beacon pattern generation ([`sequence`])
//! - FFT-based DTMF decoding with debounce ([`dtmf`])
//! - Fixed-size window assembly from capture chunks ([`window`])
//! - Envelope-based carrier (VOX) detection ([`carrier`])
//! - Playback sinks ([`sink`])

pub mod carrier;
pub mod dtmf;
pub mod pcm;
pub mod sequence;
pub mod sink;
pub mod synth;
pub mod window;
