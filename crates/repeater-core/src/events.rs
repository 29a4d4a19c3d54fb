//! Typed engine events
//!
//! Components publish [`RepeaterEvent`]s over a bounded crossbeam channel that
//! the controller polls. Publishing never blocks: when the channel is full or
//! the receiver is gone the event is dropped.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Default capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Feature module that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Dtmf,
    RogerBeep,
    Baliza,
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModuleKind::Dtmf => "dtmf",
            ModuleKind::RogerBeep => "roger_beep",
            ModuleKind::Baliza => "baliza",
        };
        f.write_str(name)
    }
}

/// Events emitted by the signal engine
#[derive(Debug, Clone, PartialEq)]
pub enum RepeaterEvent {
    /// The decoder confirmed a keypress
    DigitDetected { digit: char },
    /// Incoming carrier appeared or dropped
    CarrierChanged { active: bool },
    /// A roger-beep finished playing
    RogerBeepPlayed { duration_ms: u64 },
    /// The beacon finished a transmission
    BalizaTransmitted { count: u64, at: DateTime<Utc> },
    /// The beacon could not transmit and will retry the same firing
    BalizaPostponed { retry_in_secs: u64, reason: String },
    /// A feature module gave up on a transmission
    TransmitFailed { module: ModuleKind, reason: String },
}

/// Non-blocking publisher handle
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<RepeaterEvent>,
}

impl EventSender {
    /// Publish an event without blocking
    pub fn emit(&self, event: RepeaterEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!(?event, "event_channel_full");
            }
            Err(TrySendError::Disconnected(event)) => {
                tracing::debug!(?event, "event_receiver_gone");
            }
        }
    }
}

/// Create a bounded event channel
pub fn channel(capacity: usize) -> (EventSender, Receiver<RepeaterEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (EventSender { tx }, rx)
}
