//! Roger-beep played when an incoming transmission ends

use crate::audio::sequence::render_kenwood_beep_with;
use crate::audio::sink::AudioSink;
use crate::config::{RepeaterConfig, RogerBeepConfig};
use crate::events::{EventSender, ModuleKind, RepeaterEvent};
use crate::tx::arbiter::TransmitArbiter;
use crate::tx::TransmitError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Kenwood-style end-of-over beep
pub struct RogerBeep {
    config: RogerBeepConfig,
    arbiter: TransmitArbiter,
    acquire_timeout: Duration,
    sample_rate: u32,
    played: AtomicU64,
    events: Option<EventSender>,
}

impl RogerBeep {
    /// Out-of-range beep settings are replaced with their defaults
    pub fn new(config: &RepeaterConfig, arbiter: TransmitArbiter) -> Self {
        let mut beep_config = config.roger_beep.clone();
        beep_config.sanitize();
        Self {
            config: beep_config,
            arbiter,
            acquire_timeout: Duration::from_millis(config.arbiter.acquire_timeout_ms),
            sample_rate: config.audio.sample_rate,
            played: AtomicU64::new(0),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the beep settings, correcting out-of-range values
    pub fn configure(&mut self, config: &RogerBeepConfig) {
        let mut config = config.clone();
        config.sanitize();
        self.config = config;
    }

    pub fn config(&self) -> &RogerBeepConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Beeps played so far
    pub fn played(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }

    /// Play the beep once the channel is free
    ///
    /// Returns `Ok(false)` without touching the channel when disabled.
    ///
    /// # Errors
    /// Fails if the channel stays busy for the acquire timeout or the sink
    /// cannot play; [`RepeaterEvent::TransmitFailed`] is emitted as well.
    pub async fn execute(&self, sink: &dyn AudioSink) -> Result<bool, TransmitError> {
        if !self.config.enabled {
            tracing::debug!("roger_beep_disabled");
            return Ok(false);
        }

        match self.play(sink).await {
            Ok(duration_ms) => {
                self.played.fetch_add(1, Ordering::Relaxed);
                tracing::info!(duration_ms, "roger_beep_played");
                if let Some(events) = &self.events {
                    events.emit(RepeaterEvent::RogerBeepPlayed { duration_ms });
                }
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "roger_beep_failed");
                if let Some(events) = &self.events {
                    events.emit(RepeaterEvent::TransmitFailed {
                        module: ModuleKind::RogerBeep,
                        reason: e.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn play(&self, sink: &dyn AudioSink) -> Result<u64, TransmitError> {
        if self.config.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
        }

        let _guard = self.arbiter.acquire(self.acquire_timeout).await?;
        let pcm = render_kenwood_beep_with(
            self.config.tones_hz,
            self.config.volume,
            self.config.duration_ms,
            self.sample_rate,
        );
        let duration_ms = pcm.duration_ms();
        sink.play(pcm).await?;
        Ok(duration_ms)
    }
}
