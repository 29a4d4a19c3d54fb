//! Top-of-hour alignment and the wall clock behind it

use chrono::{DateTime, FixedOffset, Local, TimeZone, Timelike};
use std::time::Duration;

/// Source of wall-clock time for the beacon schedule
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The host's local clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Wall clock that advances with the tokio clock
///
/// Starts at a chosen instant and moves forward by the elapsed tokio time,
/// so a paused test runtime drives the wall clock too.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    start: DateTime<FixedOffset>,
    origin: tokio::time::Instant,
}

impl VirtualClock {
    pub fn starting_at(start: DateTime<FixedOffset>) -> Self {
        Self {
            start,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.start + elapsed
    }
}

/// The next top of the hour strictly after `now`
///
/// 14:37:12 maps to 15:00:00; exactly 14:00:00 maps to 15:00:00.
pub fn next_top_of_hour<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let into_hour = chrono::Duration::seconds(i64::from(now.minute() * 60 + now.second()))
        + chrono::Duration::nanoseconds(i64::from(now.nanosecond().min(999_999_999)));
    now.clone() - into_hour + chrono::Duration::hours(1)
}

/// Time left until `target`, zero if it has passed
pub fn delay_until<Tz: TimeZone>(now: &DateTime<Tz>, target: &DateTime<Tz>) -> Duration {
    target
        .clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_mid_hour_rounds_up() {
        let next = next_top_of_hour(&at("2024-05-01T14:37:00+02:00"));
        assert_eq!(next, at("2024-05-01T15:00:00+02:00"));
    }

    #[test]
    fn test_exact_hour_goes_to_next() {
        let next = next_top_of_hour(&at("2024-05-01T14:00:00+00:00"));
        assert_eq!(next, at("2024-05-01T15:00:00+00:00"));
    }

    #[test]
    fn test_subsecond_is_dropped() {
        let next = next_top_of_hour(&at("2024-05-01T14:59:59.999+00:00"));
        assert_eq!(next, at("2024-05-01T15:00:00+00:00"));
    }

    #[test]
    fn test_crosses_midnight() {
        let next = next_top_of_hour(&at("2024-12-31T23:10:00+00:00"));
        assert_eq!(next, at("2025-01-01T00:00:00+00:00"));
    }

    #[test]
    fn test_half_hour_offset_uses_local_hour() {
        let next = next_top_of_hour(&at("2024-05-01T10:45:00+05:30"));
        assert_eq!(next, at("2024-05-01T11:00:00+05:30"));
    }

    #[test]
    fn test_delay_until() {
        let now = at("2024-05-01T14:37:00+00:00");
        let next = next_top_of_hour(&now);
        assert_eq!(delay_until(&now, &next), Duration::from_secs(23 * 60));
        assert_eq!(delay_until(&next, &now), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_virtual_clock_follows_tokio_time() {
        let clock = VirtualClock::starting_at(at("2024-05-01T14:37:00+00:00"));
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), at("2024-05-01T14:38:30+00:00"));
    }
}
