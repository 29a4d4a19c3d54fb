//! Half-duplex channel gate
//!
//! The repeater has one RF output. Every module that wants to key the
//! transmitter goes through the single [`TransmitArbiter`]: it waits until the
//! channel is quiet (no incoming carrier) and no other transmission is in
//! progress, then holds a [`TransmitGuard`] for the duration of its playback.
//! Dropping the guard frees the channel, so an early return or a panic inside
//! a transmitting module can never leave the channel marked busy.

use crate::config::ArbiterConfig;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default polling interval while waiting for the channel
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors returned by the arbiter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArbiterError {
    #[error("Channel busy: no transmit slot within {waited_ms}ms")]
    ChannelBusyTimeout { waited_ms: u64 },
}

#[derive(Debug)]
struct ArbiterInner {
    /// Incoming carrier/voice present (fed by the VOX detector)
    carrier: AtomicBool,
    /// A logical transmission holds the channel
    transmitting: AtomicBool,
    /// Callers currently inside `acquire`
    waiters: AtomicUsize,
    /// Wakes waiters when a guard is released or the carrier drops
    changed: Notify,
    poll_interval: Duration,
}

/// Shared channel gate (cheap to clone)
#[derive(Debug, Clone)]
pub struct TransmitArbiter {
    inner: Arc<ArbiterInner>,
}

/// Write handle for the channel-occupancy signal
#[derive(Debug, Clone)]
pub struct CarrierSense {
    inner: Arc<ArbiterInner>,
}

impl CarrierSense {
    /// Report whether an incoming carrier is present
    pub fn set_active(&self, active: bool) {
        let previous = self.inner.carrier.swap(active, Ordering::AcqRel);
        if previous && !active {
            self.inner.changed.notify_waiters();
        }
    }

    /// Last reported carrier state
    pub fn is_active(&self) -> bool {
        self.inner.carrier.load(Ordering::Acquire)
    }
}

/// Scoped ownership of the transmitter; releases the channel on drop
#[derive(Debug)]
#[must_use = "the channel is released as soon as the guard is dropped"]
pub struct TransmitGuard {
    inner: Arc<ArbiterInner>,
    acquired_at: Instant,
}

impl TransmitGuard {
    /// Time the channel has been held
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for TransmitGuard {
    fn drop(&mut self) {
        self.inner.transmitting.store(false, Ordering::Release);
        self.inner.changed.notify_waiters();
        tracing::trace!(
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "channel_released"
        );
    }
}

/// Decrements the waiter count even if `acquire` is cancelled mid-wait
struct WaiterSlot<'a> {
    waiters: &'a AtomicUsize,
}

impl<'a> WaiterSlot<'a> {
    fn enter(waiters: &'a AtomicUsize) -> Self {
        waiters.fetch_add(1, Ordering::AcqRel);
        Self { waiters }
    }
}

impl Drop for WaiterSlot<'_> {
    fn drop(&mut self) {
        self.waiters.fetch_sub(1, Ordering::AcqRel);
    }
}

impl TransmitArbiter {
    /// Create an arbiter polling the channel every `poll_interval`
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ArbiterInner {
                carrier: AtomicBool::new(false),
                transmitting: AtomicBool::new(false),
                waiters: AtomicUsize::new(0),
                changed: Notify::new(),
                poll_interval: poll_interval.max(Duration::from_millis(1)),
            }),
        }
    }

    /// Create an arbiter from its config section
    pub fn from_config(config: &ArbiterConfig) -> Self {
        Self::new(Duration::from_millis(config.poll_interval_ms))
    }

    /// Handle for the carrier detector to report occupancy
    pub fn carrier_sense(&self) -> CarrierSense {
        CarrierSense {
            inner: Arc::clone(&self.inner),
        }
    }

    /// True iff the channel is quiet and nobody is transmitting
    pub fn is_safe_to_transmit(&self) -> bool {
        !self.inner.carrier.load(Ordering::Acquire)
            && !self.inner.transmitting.load(Ordering::Acquire)
    }

    /// Take the channel if it is free right now
    pub fn try_acquire(&self) -> Option<TransmitGuard> {
        if self.inner.carrier.load(Ordering::Acquire) {
            return None;
        }
        self.inner
            .transmitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let guard = TransmitGuard {
            inner: Arc::clone(&self.inner),
            acquired_at: Instant::now(),
        };

        // Carrier appeared between the check and the claim
        if self.inner.carrier.load(Ordering::Acquire) {
            return None;
        }
        tracing::trace!("channel_acquired");
        Some(guard)
    }

    /// Wait until the channel is free, for at most `timeout`
    ///
    /// Re-checks on every release/carrier drop and at least once per poll
    /// interval. The wait suspends the task; it never blocks the thread.
    /// Dropping the returned future abandons the wait without side effects.
    ///
    /// # Errors
    /// Returns [`ArbiterError::ChannelBusyTimeout`] once `timeout` has fully
    /// elapsed without the channel becoming free. Transmission is never
    /// forced through a busy channel. A timeout too large to represent as an
    /// instant waits indefinitely.
    pub async fn acquire(&self, timeout: Duration) -> Result<TransmitGuard, ArbiterError> {
        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        let _slot = WaiterSlot::enter(&self.inner.waiters);

        loop {
            let changed = self.inner.changed.notified();

            if let Some(guard) = self.try_acquire() {
                return Ok(guard);
            }

            let now = Instant::now();
            let mut wait = self.inner.poll_interval;
            if let Some(deadline) = deadline {
                if now >= deadline {
                    let waited_ms = now.duration_since(started).as_millis() as u64;
                    tracing::info!(waited_ms, "channel_busy_timeout");
                    return Err(ArbiterError::ChannelBusyTimeout { waited_ms });
                }
                wait = wait.min(deadline - now);
            }

            tokio::select! {
                _ = changed => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Number of callers currently waiting in [`acquire`](Self::acquire)
    pub fn pending_waiters(&self) -> usize {
        self.inner.waiters.load(Ordering::Acquire)
    }

    /// Whether a logical transmission holds the channel
    pub fn is_transmitting(&self) -> bool {
        self.inner.transmitting.load(Ordering::Acquire)
    }

    /// Whether an incoming carrier is present
    pub fn is_carrier_active(&self) -> bool {
        self.inner.carrier.load(Ordering::Acquire)
    }

    /// Polling interval while waiting
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }
}

impl Default for TransmitArbiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_channel_is_safe() {
        let arbiter = TransmitArbiter::default();
        assert!(arbiter.is_safe_to_transmit());
        assert_eq!(arbiter.pending_waiters(), 0);
    }

    #[test]
    fn test_carrier_blocks_transmit() {
        let arbiter = TransmitArbiter::default();
        let sense = arbiter.carrier_sense();
        sense.set_active(true);
        assert!(!arbiter.is_safe_to_transmit());
        assert!(arbiter.try_acquire().is_none());

        sense.set_active(false);
        assert!(arbiter.try_acquire().is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let arbiter = TransmitArbiter::default();
        {
            let _guard = arbiter.try_acquire().unwrap();
            assert!(arbiter.is_transmitting());
            assert!(!arbiter.is_safe_to_transmit());
            assert!(arbiter.try_acquire().is_none());
        }
        assert!(arbiter.is_safe_to_transmit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_free_channel_is_immediate() {
        let arbiter = TransmitArbiter::default();
        let start = Instant::now();
        let _guard = arbiter.acquire(Duration::from_secs(1)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(arbiter.pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_on_busy_carrier() {
        let arbiter = TransmitArbiter::default();
        arbiter.carrier_sense().set_active(true);

        let start = Instant::now();
        let err = arbiter
            .acquire(Duration::from_millis(1000))
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "gave up early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1100), "gave up late: {:?}", elapsed);
        let ArbiterError::ChannelBusyTimeout { waited_ms } = err;
        assert!((1000..1100).contains(&waited_ms));
        assert_eq!(arbiter.pending_waiters(), 0);
        assert!(!arbiter.is_transmitting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_wakes_on_release() {
        let arbiter = TransmitArbiter::new(Duration::from_secs(10));
        let guard = arbiter.try_acquire().unwrap();

        let waiter = {
            let arbiter = arbiter.clone();
            tokio::spawn(async move {
                let start = Instant::now();
                let guard = arbiter.acquire(Duration::from_secs(60)).await;
                (guard.is_ok(), start.elapsed())
            })
        };

        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(guard);

        let (ok, waited) = waiter.await.unwrap();
        assert!(ok);
        assert!(waited < Duration::from_secs(10), "woke after {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_waits_for_release() {
        let arbiter = TransmitArbiter::new(Duration::from_secs(10));
        let guard = arbiter.acquire(Duration::MAX).await.unwrap();
        drop(guard);

        arbiter.carrier_sense().set_active(true);
        let waiter = {
            let arbiter = arbiter.clone();
            tokio::spawn(async move { arbiter.acquire(Duration::MAX).await.is_ok() })
        };

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(arbiter.pending_waiters(), 1);

        arbiter.carrier_sense().set_active(false);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_acquire_leaves_no_waiter() {
        let arbiter = TransmitArbiter::default();
        arbiter.carrier_sense().set_active(true);

        let result =
            tokio::time::timeout(Duration::from_millis(200), arbiter.acquire(Duration::from_secs(5)))
                .await;
        assert!(result.is_err());
        assert_eq!(arbiter.pending_waiters(), 0);
    }
}
