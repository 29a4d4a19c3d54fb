//! Beacon timer task
//!
//! The scheduler owns one tokio task per armed schedule. The task sleeps until
//! the next top of the hour, asks its [`BeaconTransmitter`] to send, and on
//! failure retries the *same* firing every `retry_delay` until it succeeds.
//! Only then does it compute the next hour. A generation counter, checked
//! under the state lock before every firing, makes [`BalizaScheduler::stop`]
//! deterministic: once it returns, no new firing can begin.

use super::schedule::{delay_until, next_top_of_hour, Clock, SystemClock};
use crate::config::BalizaConfig;
use crate::events::{EventSender, RepeaterEvent};
use crate::tx::TransmitError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Retry delay when a firing could not transmit
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Something that can send the beacon once
#[async_trait]
pub trait BeaconTransmitter: Send + Sync + 'static {
    async fn transmit(&self) -> Result<(), TransmitError>;
}

/// Scheduler state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not scheduled
    Idle,
    /// Waiting for `next_fire`
    Armed { next_fire: DateTime<FixedOffset> },
    /// Transmission in progress
    Firing,
}

/// Snapshot of the schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleState {
    pub enabled: bool,
    /// Informational only
    pub interval_minutes: u32,
    /// Hour slot currently being served
    pub next_fire: Option<DateTime<FixedOffset>>,
    /// Failed attempts for the current slot
    pub pending_retries: u32,
    pub transmission_count: u64,
    pub last_fire: Option<DateTime<FixedOffset>>,
}

struct Shared {
    state: SchedulerState,
    schedule: ScheduleState,
    retry_delay: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Fires the beacon at the top of every hour
pub struct BalizaScheduler {
    shared: Arc<Mutex<Shared>>,
    transmitter: Arc<dyn BeaconTransmitter>,
    clock: Arc<dyn Clock>,
    events: Option<EventSender>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BalizaScheduler {
    /// Create an idle scheduler using the system clock
    pub fn new(transmitter: Arc<dyn BeaconTransmitter>, config: &BalizaConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: SchedulerState::Idle,
                schedule: ScheduleState {
                    enabled: config.enabled,
                    interval_minutes: config.interval_minutes,
                    next_fire: None,
                    pending_retries: 0,
                    transmission_count: 0,
                    last_fire: None,
                },
                retry_delay: Duration::from_secs(config.retry_delay_secs),
                generation: 0,
                task: None,
            })),
            transmitter,
            clock: Arc::new(SystemClock),
            events: None,
        }
    }

    /// Use a different wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish [`RepeaterEvent::BalizaPostponed`] on retries
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Arm the schedule from now
    ///
    /// Any pending timer is cancelled first. Does nothing while disabled.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut shared = lock(&self.shared);
        Self::cancel(&mut shared);

        if !shared.schedule.enabled {
            tracing::info!("baliza_disabled");
            return;
        }

        let generation = shared.generation;
        let now = self.clock.now();
        let next_fire = next_top_of_hour(&now);
        shared.state = SchedulerState::Armed { next_fire };
        shared.schedule.next_fire = Some(next_fire);
        shared.schedule.pending_retries = 0;

        let task = FiringTask {
            shared: Arc::clone(&self.shared),
            transmitter: Arc::clone(&self.transmitter),
            clock: Arc::clone(&self.clock),
            events: self.events.clone(),
            generation,
        };
        shared.task = Some(tokio::spawn(task.run(now, next_fire)));
        tracing::info!(next_fire = %next_fire, "baliza_armed");
    }

    /// Cancel the schedule and clear its history
    ///
    /// After this returns no new firing will begin. A transmission already in
    /// progress is aborted.
    pub fn stop(&self) {
        let mut shared = lock(&self.shared);
        Self::cancel(&mut shared);
        shared.schedule.transmission_count = 0;
        shared.schedule.last_fire = None;
        tracing::info!("baliza_stopped");
    }

    fn cancel(shared: &mut Shared) {
        shared.generation = shared.generation.wrapping_add(1);
        if let Some(task) = shared.task.take() {
            task.abort();
        }
        shared.state = SchedulerState::Idle;
        shared.schedule.next_fire = None;
        shared.schedule.pending_retries = 0;
    }

    /// Apply new settings
    ///
    /// A change to `enabled` or the interval restarts the schedule from now
    /// (or stops it when disabled). Returns whether the schedule was reset.
    pub fn configure(&self, config: &BalizaConfig) -> bool {
        let restart = {
            let mut shared = lock(&self.shared);
            shared.retry_delay = Duration::from_secs(config.retry_delay_secs);
            let changed = shared.schedule.enabled != config.enabled
                || shared.schedule.interval_minutes != config.interval_minutes;
            shared.schedule.enabled = config.enabled;
            shared.schedule.interval_minutes = config.interval_minutes;
            changed
        };

        if restart {
            if config.enabled {
                self.start();
            } else {
                self.stop();
            }
        }
        restart
    }

    /// Current state machine position
    pub fn state(&self) -> SchedulerState {
        lock(&self.shared).state
    }

    /// Snapshot of the schedule
    pub fn schedule(&self) -> ScheduleState {
        lock(&self.shared).schedule.clone()
    }

    /// Hour slot currently being served, if armed
    pub fn next_fire(&self) -> Option<DateTime<FixedOffset>> {
        lock(&self.shared).schedule.next_fire
    }

    /// Successful transmissions since the last [`stop`](Self::stop)
    pub fn transmission_count(&self) -> u64 {
        lock(&self.shared).schedule.transmission_count
    }
}

impl Drop for BalizaScheduler {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        Self::cancel(&mut shared);
    }
}

struct FiringTask {
    shared: Arc<Mutex<Shared>>,
    transmitter: Arc<dyn BeaconTransmitter>,
    clock: Arc<dyn Clock>,
    events: Option<EventSender>,
    generation: u64,
}

impl FiringTask {
    /// Lock the state if this task still owns the schedule
    fn owned(&self) -> Option<MutexGuard<'_, Shared>> {
        let shared = lock(&self.shared);
        (shared.generation == self.generation).then_some(shared)
    }

    async fn run(self, mut now: DateTime<FixedOffset>, mut next_fire: DateTime<FixedOffset>) {
        loop {
            tokio::time::sleep(delay_until(&now, &next_fire)).await;

            // Serve this slot until it transmits
            loop {
                {
                    let Some(mut shared) = self.owned() else {
                        return;
                    };
                    shared.state = SchedulerState::Firing;
                }

                match self.transmitter.transmit().await {
                    Ok(()) => {
                        let fired_at = self.clock.now();
                        let Some(mut shared) = self.owned() else {
                            return;
                        };
                        shared.schedule.transmission_count += 1;
                        shared.schedule.last_fire = Some(fired_at);
                        shared.schedule.pending_retries = 0;
                        tracing::info!(
                            slot = %next_fire,
                            count = shared.schedule.transmission_count,
                            "baliza_fired"
                        );
                        break;
                    }
                    Err(e) => {
                        let retry_delay = {
                            let Some(mut shared) = self.owned() else {
                                return;
                            };
                            shared.schedule.pending_retries += 1;
                            shared.state = SchedulerState::Armed { next_fire };
                            shared.retry_delay
                        };
                        tracing::info!(
                            slot = %next_fire,
                            error = %e,
                            retry_in_secs = retry_delay.as_secs(),
                            "baliza_postponed"
                        );
                        if let Some(events) = &self.events {
                            events.emit(RepeaterEvent::BalizaPostponed {
                                retry_in_secs: retry_delay.as_secs(),
                                reason: e.to_string(),
                            });
                        }
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }

            now = self.clock.now();
            next_fire = next_top_of_hour(&now);
            let Some(mut shared) = self.owned() else {
                return;
            };
            shared.state = SchedulerState::Armed { next_fire };
            shared.schedule.next_fire = Some(next_fire);
            tracing::info!(next_fire = %next_fire, "baliza_armed");
        }
    }
}
