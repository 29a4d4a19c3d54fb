//! Repeater - audio signal engine for a half-duplex amateur-radio repeater
//!
//! This library re-exports the DTMF decoder, tone synthesis, transmit
//! arbitration, beacon scheduling and feature modules from `repeater-core`.

pub use repeater_core::audio;
pub use repeater_core::beacon;
pub use repeater_core::config;
pub use repeater_core::events;
pub use repeater_core::modules;
pub use repeater_core::tx;

pub use repeater_core::{
    BalizaScheduler, DtmfDecoder, EventSender, PcmBuffer, RepeaterConfig, RepeaterEvent,
    ToneSpec, TransmitArbiter, TransmitGuard,
};
pub use repeater_core::{DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_SIZE, VERSION};
