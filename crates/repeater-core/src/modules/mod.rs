//! Feature modules
//!
//! Each module is a variant of [`FeatureModule`]. Status reporting matches
//! over the variant and builds a typed [`ModuleStatus`].

pub mod baliza;
pub mod roger_beep;

pub use crate::events::ModuleKind;

use crate::audio::dtmf::{DecoderPhase, DecoderStats, DtmfDecoder};
use baliza::Baliza;
use roger_beep::RogerBeep;
use std::sync::Arc;

/// A feature module owned by the controller
pub enum FeatureModule {
    Dtmf(DtmfDecoder),
    RogerBeep(RogerBeep),
    /// Shared with the beacon scheduler
    Baliza(Arc<Baliza>),
}

/// Status snapshot of one module
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleStatus {
    Dtmf {
        phase: DecoderPhase,
        stats: DecoderStats,
    },
    RogerBeep {
        enabled: bool,
        volume: f64,
        duration_ms: u32,
        played: u64,
    },
    Baliza {
        enabled: bool,
        tone_hz: f64,
        transmissions: u64,
    },
}

impl FeatureModule {
    pub fn kind(&self) -> ModuleKind {
        match self {
            FeatureModule::Dtmf(_) => ModuleKind::Dtmf,
            FeatureModule::RogerBeep(_) => ModuleKind::RogerBeep,
            FeatureModule::Baliza(_) => ModuleKind::Baliza,
        }
    }

    pub fn status(&self) -> ModuleStatus {
        match self {
            FeatureModule::Dtmf(decoder) => ModuleStatus::Dtmf {
                phase: decoder.phase(),
                stats: decoder.stats(),
            },
            FeatureModule::RogerBeep(beep) => ModuleStatus::RogerBeep {
                enabled: beep.is_enabled(),
                volume: beep.config().volume,
                duration_ms: beep.config().duration_ms,
                played: beep.played(),
            },
            FeatureModule::Baliza(baliza) => {
                let config = baliza.config();
                ModuleStatus::Baliza {
                    enabled: config.enabled,
                    tone_hz: config.tone_hz,
                    transmissions: baliza.transmission_count(),
                }
            }
        }
    }
}

impl ModuleStatus {
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleStatus::Dtmf { .. } => ModuleKind::Dtmf,
            ModuleStatus::RogerBeep { .. } => ModuleKind::RogerBeep,
            ModuleStatus::Baliza { .. } => ModuleKind::Baliza,
        }
    }

    /// The decoder is always on; the others follow their config
    pub fn is_enabled(&self) -> bool {
        match self {
            ModuleStatus::Dtmf { .. } => true,
            ModuleStatus::RogerBeep { enabled, .. } | ModuleStatus::Baliza { enabled, .. } => {
                *enabled
            }
        }
    }
}
