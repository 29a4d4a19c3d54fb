//! Hourly BBC-pips beacon

use crate::audio::sequence::render_bbc_pips_with;
use crate::audio::sink::AudioSink;
use crate::beacon::scheduler::BeaconTransmitter;
use crate::config::{BalizaConfig, RepeaterConfig};
use crate::events::{EventSender, ModuleKind, RepeaterEvent};
use crate::tx::arbiter::TransmitArbiter;
use crate::tx::TransmitError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Beacon transmitter: acquires the channel and plays the pips
///
/// The whole ~5.5s sequence goes to the sink as one buffer in one call, so
/// the VOX never drops key between pips.
pub struct Baliza {
    /// Shared with the scheduler, so settings change through `&self`
    config: Mutex<BalizaConfig>,
    arbiter: TransmitArbiter,
    sink: Arc<dyn AudioSink>,
    acquire_timeout: Duration,
    sample_rate: u32,
    transmissions: AtomicU64,
    events: Option<EventSender>,
}

impl Baliza {
    /// Out-of-range beacon settings are replaced with their defaults
    pub fn new(config: &RepeaterConfig, arbiter: TransmitArbiter, sink: Arc<dyn AudioSink>) -> Self {
        let mut baliza_config = config.baliza.clone();
        baliza_config.sanitize();
        Self {
            config: Mutex::new(baliza_config),
            arbiter,
            sink,
            acquire_timeout: Duration::from_millis(config.arbiter.acquire_timeout_ms),
            sample_rate: config.audio.sample_rate,
            transmissions: AtomicU64::new(0),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    fn settings(&self) -> MutexGuard<'_, BalizaConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the beacon settings, correcting out-of-range values
    ///
    /// Pass the same config to [`BalizaScheduler::configure`] so the
    /// schedule follows it.
    ///
    /// [`BalizaScheduler::configure`]: crate::beacon::scheduler::BalizaScheduler::configure
    pub fn configure(&self, config: &BalizaConfig) {
        let mut config = config.clone();
        config.sanitize();
        tracing::info!(enabled = config.enabled, tone_hz = config.tone_hz, "baliza_configured");
        *self.settings() = config;
    }

    /// Snapshot of the current settings
    pub fn config(&self) -> BalizaConfig {
        self.settings().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.settings().enabled
    }

    /// Completed transmissions
    pub fn transmission_count(&self) -> u64 {
        self.transmissions.load(Ordering::Relaxed)
    }

    async fn send(&self) -> Result<u64, TransmitError> {
        let _guard = self.arbiter.acquire(self.acquire_timeout).await?;
        let (tone_hz, volume) = {
            let config = self.settings();
            (config.tone_hz, config.volume)
        };
        let (pcm, duration_ms) = render_bbc_pips_with(tone_hz, volume, self.sample_rate);
        tracing::info!(duration_ms, "baliza_transmitting");
        self.sink.play(pcm).await?;
        Ok(self.transmissions.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl BeaconTransmitter for Baliza {
    async fn transmit(&self) -> Result<(), TransmitError> {
        match self.send().await {
            Ok(count) => {
                tracing::info!(count, "baliza_transmitted");
                if let Some(events) = &self.events {
                    events.emit(RepeaterEvent::BalizaTransmitted {
                        count,
                        at: Utc::now(),
                    });
                }
                Ok(())
            }
            Err(e) => {
                if !e.is_channel_busy() {
                    tracing::error!(error = %e, "baliza_playback_failed");
                    if let Some(events) = &self.events {
                        events.emit(RepeaterEvent::TransmitFailed {
                            module: ModuleKind::Baliza,
                            reason: e.to_string(),
                        });
                    }
                }
                Err(e)
            }
        }
    }
}
