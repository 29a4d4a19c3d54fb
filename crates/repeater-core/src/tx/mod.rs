//! Transmit side of the repeater
//!
//! - Channel gate serializing every transmission ([`arbiter`])
//! - [`TransmitError`], the failure a feature module reports for one attempt

pub mod arbiter;

use crate::audio::sink::SinkError;
use arbiter::ArbiterError;
use thiserror::Error;

/// Why a feature module could not complete a transmission
#[derive(Error, Debug)]
pub enum TransmitError {
    #[error(transparent)]
    ChannelBusy(#[from] ArbiterError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl TransmitError {
    /// True when the channel was never free (nothing was played)
    pub fn is_channel_busy(&self) -> bool {
        matches!(self, TransmitError::ChannelBusy(_))
    }
}
