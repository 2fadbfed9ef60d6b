//! Delivery statistics
//!
//! Receivers turn every valid probe into a [`DeliveryEvent`]. A single
//! accumulator task folds the primary party's events into the live
//! [`IntervalStats`] and closes one snapshot per interval into the
//! [`HistoryWindow`].

pub mod accumulator;
pub mod window;

pub use accumulator::{classify, run_accumulator, Acceptance, StatsAccumulator};
pub use window::{HistoryWindow, WindowReader};

use std::time::Duration;

use serde::Serialize;

use crate::clock::units_to_duration;

/// One received and origin-checked probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryEvent {
    /// Sequence number carried by the probe
    pub sequence: u16,
    /// Receive stamp minus send stamp, in media clock units
    pub delay: u32,
}

/// Counters of one interval.
///
/// Serialized with the field names the status consumers expect:
/// `unixtime`, `received`, `ooo`, `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntervalStats {
    /// Unix time (seconds) the interval started
    #[serde(rename = "unixtime")]
    pub interval_start: i64,
    /// Probes accepted as in order
    pub received: u16,
    /// Sequence numbers skipped between accepted probes
    #[serde(rename = "ooo")]
    pub out_of_order: u16,
    /// Sum of the delays of accepted probes, in media clock units
    #[serde(rename = "delay")]
    pub cumulative_delay: u32,
    /// Highest sequence number accepted so far (carried across intervals)
    #[serde(skip)]
    pub last_sequence: u16,
}

impl IntervalStats {
    /// Empty counters for an interval starting at `interval_start`
    pub fn new(interval_start: i64) -> Self {
        Self {
            interval_start,
            received: 0,
            out_of_order: 0,
            cumulative_delay: 0,
            last_sequence: 0,
        }
    }

    /// Mean delay of the accepted probes, if any were accepted
    pub fn average_delay(&self) -> Option<Duration> {
        if self.received == 0 {
            return None;
        }
        let mean_units = self.cumulative_delay / self.received as u32;
        Some(units_to_duration(mean_units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names() {
        let stats = IntervalStats {
            interval_start: 1_700_000_000,
            received: 2950,
            out_of_order: 3,
            cumulative_delay: 16_000,
            last_sequence: 4242,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(
            json,
            r#"{"unixtime":1700000000,"received":2950,"ooo":3,"delay":16000}"#
        );
    }

    #[test]
    fn test_average_delay() {
        let mut stats = IntervalStats::new(0);
        assert_eq!(stats.average_delay(), None);

        stats.received = 4;
        stats.cumulative_delay = 160; // 40 units each = 5 ms at 8 kHz
        assert_eq!(stats.average_delay(), Some(Duration::from_millis(5)));
    }
}
