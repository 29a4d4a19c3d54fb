//! Repeater Core - DTMF decoding, tone synthesis, and transmit arbitration
//!
//! This library provides the real-time audio signal engine of a half-duplex
//! amateur-radio repeater. It recognizes DTMF control digits in the received
//! audio, renders the roger-beep and the hourly beacon ("baliza") as exact
//! PCM waveforms, and serializes every transmission through a single
//! channel gate so the repeater never talks over itself.

pub mod audio;
pub mod beacon;
pub mod config;
pub mod events;
pub mod modules;
pub mod tx;

pub use audio::dtmf::DtmfDecoder;
pub use audio::pcm::PcmBuffer;
pub use audio::synth::ToneSpec;
pub use beacon::scheduler::BalizaScheduler;
pub use config::RepeaterConfig;
pub use events::{EventSender, RepeaterEvent};
pub use tx::arbiter::{TransmitArbiter, TransmitGuard};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate for audio processing (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default DTMF analysis window in samples (~42.7ms at 48kHz)
pub const DEFAULT_WINDOW_SIZE: usize = 2048;
