//! Hourly beacon ("baliza") timing
//!
//! - Wall-clock alignment to the top of the hour ([`schedule`])
//! - The timer task that fires and retries the beacon ([`scheduler`])

pub mod schedule;
pub mod scheduler;
