//! Wall-clock derived media timestamps
//!
//! Both simulated parties stamp packets with the same formula, so the
//! difference between the receive-time stamp and the embedded send stamp is
//! the relay plus processing latency in media clock units. It is not a true
//! one-way network delay.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Media clock rate used by the probes (8 kHz)
pub const MEDIA_CLOCK_RATE: u32 = 8000;

fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Media timestamp for a point `since_epoch` after the Unix epoch.
///
/// Sub-unit remainders are truncated and the result wraps modulo 2^32.
pub fn media_timestamp_at(since_epoch: Duration) -> u32 {
    let units = since_epoch.as_nanos() * MEDIA_CLOCK_RATE as u128 / NANOS_PER_SEC;
    units as u32
}

/// Current media timestamp; a pure function of system time
pub fn media_timestamp() -> u32 {
    media_timestamp_at(since_epoch())
}

/// Wall-clock span covered by `units` media clock units
pub fn units_to_duration(units: u32) -> Duration {
    let nanos = units as u128 * NANOS_PER_SEC / MEDIA_CLOCK_RATE as u128;
    Duration::from_nanos(nanos as u64)
}

/// Units elapsed from `then` to `now`, across 32-bit wraparound
pub fn elapsed_units(now: u32, then: u32) -> u32 {
    now.wrapping_sub(then)
}

/// Current Unix time in whole seconds
pub fn unix_time() -> i64 {
    since_epoch().as_secs() as i64
}
