//! Envelope-based carrier (VOX) detection for channel occupancy
//!
//! Follows the received audio with a fast-attack / slow-release envelope.
//! The channel becomes busy as soon as the envelope crosses the open
//! threshold and is declared free again only after it stays below the
//! threshold for the whole hang time, so short pauses in speech do not hand
//! the channel to the transmitter.

use crate::events::{EventSender, RepeaterEvent};
use crate::tx::arbiter::CarrierSense;

/// Envelope attack time
const ATTACK_TIME_MS: f32 = 1.0;

/// Envelope release time
const RELEASE_TIME_MS: f32 = 20.0;

/// Change in channel occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierTransition {
    /// Incoming signal appeared
    Rose,
    /// Incoming signal gone for the full hang time
    Dropped,
}

/// Carrier detector over the received audio
///
/// # Example
/// ```
/// use repeater_core::audio::carrier::{CarrierDetector, CarrierTransition};
///
/// let mut detector = CarrierDetector::new(8000, 0.05, 100);
/// assert_eq!(detector.process(&[0.5; 80]), Some(CarrierTransition::Rose));
/// assert!(detector.is_active());
/// ```
#[derive(Debug)]
pub struct CarrierDetector {
    sample_rate: u32,
    envelope: f32,
    open_threshold: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Samples the envelope must stay low before the carrier drops
    hang_samples: usize,
    samples_below: usize,
    active: bool,
    sense: Option<CarrierSense>,
    events: Option<EventSender>,
}

impl CarrierDetector {
    /// Create a detector
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `open_threshold` - Envelope level (0.0 to 1.0) that marks a carrier
    /// * `hang_time_ms` - Quiet time before the channel is free again
    pub fn new(sample_rate: u32, open_threshold: f32, hang_time_ms: u64) -> Self {
        let hang_samples = (sample_rate as u64 * hang_time_ms / 1000) as usize;
        Self {
            sample_rate,
            envelope: 0.0,
            open_threshold: open_threshold.max(1e-4),
            attack_coeff: Self::time_to_coeff(ATTACK_TIME_MS, sample_rate),
            release_coeff: Self::time_to_coeff(RELEASE_TIME_MS, sample_rate),
            hang_samples,
            samples_below: 0,
            active: false,
            sense: None,
            events: None,
        }
    }

    /// Drive an arbiter's occupancy signal from this detector
    pub fn with_sense(mut self, sense: CarrierSense) -> Self {
        self.sense = Some(sense);
        self
    }

    /// Publish [`RepeaterEvent::CarrierChanged`] on transitions
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Convert time constant to exponential coefficient
    fn time_to_coeff(time_ms: f32, sample_rate: u32) -> f32 {
        let samples = time_ms * sample_rate as f32 / 1000.0;
        (-1.0 / samples.max(1.0)).exp()
    }

    /// Process a chunk of received samples
    ///
    /// Returns the net occupancy change over the chunk, if any.
    pub fn process(&mut self, samples: &[f32]) -> Option<CarrierTransition> {
        let was_active = self.active;

        for &sample in samples {
            let abs = sample.abs();
            let coeff = if abs > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = self.envelope * coeff + abs * (1.0 - coeff);

            if self.envelope >= self.open_threshold {
                self.samples_below = 0;
                self.active = true;
            } else if self.active {
                self.samples_below += 1;
                if self.samples_below >= self.hang_samples {
                    self.active = false;
                }
            }
        }

        let transition = match (was_active, self.active) {
            (false, true) => CarrierTransition::Rose,
            (true, false) => CarrierTransition::Dropped,
            _ => return None,
        };

        tracing::debug!(transition = ?transition, envelope = self.envelope, "carrier_transition");
        if let Some(sense) = &self.sense {
            sense.set_active(self.active);
        }
        if let Some(events) = &self.events {
            events.emit(RepeaterEvent::CarrierChanged {
                active: self.active,
            });
        }
        Some(transition)
    }

    /// Whether a carrier is currently present
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current envelope level
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Reset detector state (does not touch the attached sense handle)
    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.samples_below = 0;
        self.active = false;
    }
}
