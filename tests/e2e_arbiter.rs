//! E2E tests for channel arbitration
//!
//! Drives the arbiter from the carrier detector and lets feature modules
//! compete for the single transmitter, all in virtual time.

use async_trait::async_trait;
use repeater::audio::carrier::{CarrierDetector, CarrierTransition};
use repeater::audio::pcm::PcmBuffer;
use repeater::audio::sink::{AudioSink, NullSink, SinkError};
use repeater::config::RepeaterConfig;
use repeater::modules::roger_beep::RogerBeep;
use repeater::tx::arbiter::ArbiterError;
use repeater::TransmitArbiter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Sink that fails the test if two playbacks ever overlap
#[derive(Default)]
struct OverlapCheckingSink {
    active: AtomicUsize,
    max_active: AtomicUsize,
    plays: AtomicUsize,
}

#[async_trait]
impl AudioSink for OverlapCheckingSink {
    async fn play(&self, pcm: PcmBuffer) -> Result<(), SinkError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        tokio::time::sleep(pcm.duration()).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Test that a busy carrier makes acquire give up after the full timeout
#[tokio::test(start_paused = true)]
async fn test_busy_carrier_times_out() {
    let arbiter = TransmitArbiter::default();
    let mut detector = CarrierDetector::new(8000, 0.05, 500).with_sense(arbiter.carrier_sense());
    assert_eq!(
        detector.process(&[0.4; 800]),
        Some(CarrierTransition::Rose)
    );

    let start = Instant::now();
    let result = arbiter.acquire(Duration::from_secs(1)).await;
    let elapsed = start.elapsed();

    assert!(matches!(
        result,
        Err(ArbiterError::ChannelBusyTimeout { .. })
    ));
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1100));
}

/// Test that a waiter gets the channel once the carrier hang time expires
#[tokio::test(start_paused = true)]
async fn test_acquire_after_carrier_drop() {
    let arbiter = TransmitArbiter::new(Duration::from_millis(50));
    let mut detector = CarrierDetector::new(8000, 0.05, 100).with_sense(arbiter.carrier_sense());
    detector.process(&[0.4; 800]);

    let waiter = {
        let arbiter = arbiter.clone();
        tokio::spawn(async move { arbiter.acquire(Duration::from_secs(5)).await.is_ok() })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(arbiter.pending_waiters(), 1);

    // Received audio goes quiet for longer than the hang time
    assert_eq!(
        detector.process(&[0.0; 2000]),
        Some(CarrierTransition::Dropped)
    );
    assert!(waiter.await.unwrap());
}

/// Test that concurrent modules never overlap on air
#[tokio::test(start_paused = true)]
async fn test_concurrent_transmissions_serialize() {
    let mut config = RepeaterConfig::default();
    config.arbiter.acquire_timeout_ms = 10_000;
    let arbiter = TransmitArbiter::new(Duration::from_millis(100));
    let sink = Arc::new(OverlapCheckingSink::default());

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let beep = RogerBeep::new(&config, arbiter.clone());
        let sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            beep.execute(sink.as_ref()).await.is_ok()
        }));
    }

    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert_eq!(sink.plays.load(Ordering::SeqCst), 4);
    assert_eq!(sink.max_active.load(Ordering::SeqCst), 1);
    assert!(arbiter.is_safe_to_transmit());
}

/// Test that the roger-beep waits for the channel instead of talking over it
#[tokio::test(start_paused = true)]
async fn test_roger_beep_waits_for_free_channel() {
    let config = RepeaterConfig::default();
    let arbiter = TransmitArbiter::new(Duration::from_millis(100));
    let sense = arbiter.carrier_sense();
    sense.set_active(true);

    let beep = RogerBeep::new(&config, arbiter.clone());
    let start = Instant::now();
    let task = tokio::spawn(async move { beep.execute(&NullSink).await.is_ok() });

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!arbiter.is_transmitting());
    sense.set_active(false);

    assert!(task.await.unwrap());
    assert!(start.elapsed() >= Duration::from_millis(700 + 269));
}

/// Test that dropping the guard inside a failing playback frees the channel
#[tokio::test(start_paused = true)]
async fn test_failed_playback_releases_channel() {
    struct BrokenSink;

    #[async_trait]
    impl AudioSink for BrokenSink {
        async fn play(&self, _pcm: PcmBuffer) -> Result<(), SinkError> {
            Err(SinkError::Playback("device unplugged".into()))
        }
    }

    let arbiter = TransmitArbiter::default();
    let beep = RogerBeep::new(&RepeaterConfig::default(), arbiter.clone());
    assert!(beep.execute(&BrokenSink).await.is_err());
    assert!(arbiter.is_safe_to_transmit());
    assert!(arbiter.try_acquire().is_some());
}
