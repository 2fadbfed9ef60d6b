//! Sequence-aware interval accumulator
//!
//! Only monotonic progress is counted. A probe is accepted when its sequence
//! number is above the last accepted one, or when it is a low number right
//! after a high one (16-bit rollover). Everything else is late, duplicated
//! or retrograde and is dropped without touching the counters. The gap
//! between consecutive accepted numbers is added to `out_of_order`, which
//! therefore counts loss and reordering together.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{DeliveryEvent, HistoryWindow, IntervalStats};
use crate::clock;

/// A sequence number below this after one above [`WRAP_HIGH_MARK`] is a rollover
pub const WRAP_LOW_MARK: u16 = 10_000;
/// See [`WRAP_LOW_MARK`]
pub const WRAP_HIGH_MARK: u16 = 60_000;

/// How often the accumulator task checks for rollover without traffic
const ROLLOVER_TICK: Duration = Duration::from_secs(1);

/// Outcome of offering a sequence number to the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Above the last accepted number
    InOrder,
    /// Low number after a high one: 16-bit rollover
    Wrapped,
    /// Late, duplicate or retrograde; ignored
    Discarded,
}

/// Classify `sequence` against the last accepted sequence number
pub fn classify(sequence: u16, last: u16) -> Acceptance {
    if sequence < WRAP_LOW_MARK && last > WRAP_HIGH_MARK {
        Acceptance::Wrapped
    } else if sequence > last {
        Acceptance::InOrder
    } else {
        Acceptance::Discarded
    }
}

/// Live counters of the monitored direction plus the window they roll into
#[derive(Debug)]
pub struct StatsAccumulator {
    current: IntervalStats,
    interval_secs: i64,
    window: HistoryWindow,
}

impl StatsAccumulator {
    /// Start accumulating at Unix time `start`, closing an interval every `interval_secs`
    pub fn new(window: HistoryWindow, interval_secs: u64, start: i64) -> Self {
        Self {
            current: IntervalStats::new(start),
            interval_secs: interval_secs.max(1) as i64,
            window,
        }
    }

    /// Counters of the interval in progress
    pub fn current(&self) -> &IntervalStats {
        &self.current
    }

    /// The window closed intervals are pushed to
    pub fn window(&self) -> &HistoryWindow {
        &self.window
    }

    /// Handle one delivery event observed at Unix time `now`.
    ///
    /// The rollover check runs first and regardless of whether the event is
    /// accepted.
    pub fn record(&mut self, event: DeliveryEvent, now: i64) -> Acceptance {
        self.roll_over(now);
        self.apply(event)
    }

    fn apply(&mut self, event: DeliveryEvent) -> Acceptance {
        let last = self.current.last_sequence;
        let outcome = classify(event.sequence, last);

        let gap = match outcome {
            Acceptance::InOrder => event.sequence - (last + 1),
            Acceptance::Wrapped => event.sequence + (u16::MAX - last),
            Acceptance::Discarded => {
                trace!(sequence = event.sequence, last, "probe discarded");
                return outcome;
            }
        };

        let stats = &mut self.current;
        stats.received = stats.received.wrapping_add(1);
        stats.cumulative_delay = stats.cumulative_delay.wrapping_add(event.delay);
        stats.out_of_order = stats.out_of_order.wrapping_add(gap);
        stats.last_sequence = event.sequence;
        outcome
    }

    /// Close every interval that ended at or before `now`.
    ///
    /// Each closed interval is pushed to the window and the next one starts
    /// exactly one interval later, keeping a fixed cadence. Intervals with no
    /// traffic close as zero-count snapshots. Returns the number closed.
    pub fn roll_over(&mut self, now: i64) -> usize {
        let pending = (now - self.current.interval_start).div_euclid(self.interval_secs);
        if pending <= 0 {
            return 0;
        }

        // Intervals that would be evicted before the call returns are skipped
        let capacity = self.window.capacity() as i64;
        if pending > capacity {
            let skipped = pending - capacity;
            warn!(skipped, "wall clock jumped ahead, skipping intervals");
            self.current = IntervalStats {
                interval_start: self.current.interval_start + skipped * self.interval_secs,
                last_sequence: self.current.last_sequence,
                ..IntervalStats::new(0)
            };
        }

        let mut closed = 0;
        while now >= self.current.interval_start + self.interval_secs {
            let snapshot = self.current;
            info!(
                interval_start = snapshot.interval_start,
                last_sequence = snapshot.last_sequence,
                received = snapshot.received,
                out_of_order = snapshot.out_of_order,
                delay = snapshot.cumulative_delay,
                avg_delay_ms = snapshot.average_delay().map(|d| d.as_secs_f64() * 1000.0),
                "interval closed"
            );
            self.window.push_back(snapshot);

            self.current = IntervalStats {
                interval_start: snapshot.interval_start + self.interval_secs,
                last_sequence: snapshot.last_sequence,
                ..IntervalStats::new(0)
            };
            closed += 1;
        }
        closed
    }
}

/// Accumulator task.
///
/// Folds events from `primary` into the window and drains `secondary`
/// without counting it, so the two directions are never merged. A timer
/// also runs the rollover check so a silent relay still yields (empty)
/// snapshots. Returns the accumulator once `primary` is closed.
pub async fn run_accumulator(
    mut accumulator: StatsAccumulator,
    mut primary: mpsc::Receiver<DeliveryEvent>,
    mut secondary: mpsc::Receiver<DeliveryEvent>,
) -> StatsAccumulator {
    let mut ticker = tokio::time::interval(ROLLOVER_TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut secondary_open = true;
    let mut secondary_seen: u64 = 0;

    loop {
        tokio::select! {
            event = primary.recv() => match event {
                Some(event) => {
                    accumulator.record(event, clock::unix_time());
                }
                None => {
                    debug!("primary event channel closed, accumulator stopping");
                    break;
                }
            },
            event = secondary.recv(), if secondary_open => match event {
                Some(event) => {
                    secondary_seen += 1;
                    trace!(sequence = event.sequence, secondary_seen, "secondary probe not tracked");
                }
                None => secondary_open = false,
            },
            _ = ticker.tick() => {
                accumulator.roll_over(clock::unix_time());
            }
        }
    }

    accumulator
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000;

    fn accumulator(capacity: usize, interval_secs: u64) -> StatsAccumulator {
        StatsAccumulator::new(HistoryWindow::new(capacity, 1).unwrap(), interval_secs, T0)
    }

    fn event(sequence: u16) -> DeliveryEvent {
        DeliveryEvent { sequence, delay: 10 }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(101, 100), Acceptance::InOrder);
        assert_eq!(classify(100, 100), Acceptance::Discarded);
        assert_eq!(classify(99, 100), Acceptance::Discarded);
        assert_eq!(classify(2, 65534), Acceptance::Wrapped);
        assert_eq!(classify(0, 65535), Acceptance::Wrapped);
        // low number after a mid-range one is retrograde, not a rollover
        assert_eq!(classify(5, 30000), Acceptance::Discarded);
        // boundaries of the rollover window are exclusive
        assert_eq!(classify(10_000, 65000), Acceptance::Discarded);
        assert_eq!(classify(5, 60_000), Acceptance::Discarded);
    }

    #[test]
    fn test_sequential_run_has_no_gaps() {
        let mut acc = accumulator(3, 60);
        for s in 1..=50 {
            assert_eq!(acc.record(event(s), T0), Acceptance::InOrder);
        }
        let stats = acc.current();
        assert_eq!(stats.received, 50);
        assert_eq!(stats.out_of_order, 0);
        assert_eq!(stats.cumulative_delay, 500);
        assert_eq!(stats.last_sequence, 50);
    }

    #[test]
    fn test_single_skip_counts_one_gap() {
        let mut acc = accumulator(3, 60);
        acc.record(event(100), T0);
        let before = *acc.current();
        assert_eq!(before.last_sequence, 100);

        acc.record(event(102), T0);
        let after = acc.current();
        assert_eq!(after.out_of_order - before.out_of_order, 1);
        assert_eq!(after.received - before.received, 1);
        assert_eq!(after.last_sequence, 102);
    }

    #[test]
    fn test_retrograde_and_duplicate_leave_counters_unchanged() {
        let mut acc = accumulator(3, 60);
        acc.record(event(100), T0);
        acc.record(event(105), T0);
        let before = *acc.current();

        for s in [105, 104, 1, 30000] {
            assert_eq!(acc.record(event(s), T0), Acceptance::Discarded);
        }
        assert_eq!(*acc.current(), before);
    }

    #[test]
    fn test_wraparound_is_not_a_loss_spike() {
        let mut acc = accumulator(3, 60);
        acc.record(event(65530), T0);
        let base = *acc.current();

        assert_eq!(acc.record(event(65534), T0), Acceptance::InOrder);
        assert_eq!(acc.current().out_of_order - base.out_of_order, 3);

        // 65535, 0 and 1 skipped: 2 + (65535 - 65534) = 3
        assert_eq!(acc.record(event(2), T0), Acceptance::Wrapped);
        assert_eq!(acc.current().out_of_order - base.out_of_order, 6);
        assert_eq!(acc.current().last_sequence, 2);

        assert_eq!(acc.record(event(6), T0), Acceptance::InOrder);
        let stats = acc.current();
        assert_eq!(stats.out_of_order - base.out_of_order, 9);
        assert_eq!(stats.received - base.received, 3);
        assert_eq!(stats.last_sequence, 6);
    }

    #[test]
    fn test_seamless_wrap_counts_nothing() {
        let mut acc = accumulator(3, 60);
        acc.record(event(65534), T0);
        let base = acc.current().out_of_order;
        acc.record(event(65535), T0);
        acc.record(event(0), T0);
        acc.record(event(1), T0);
        assert_eq!(acc.current().out_of_order, base);
        assert_eq!(acc.current().received, 4);
    }

    #[test]
    fn test_rollover_keeps_cadence_and_last_sequence() {
        let mut acc = accumulator(5, 10);
        acc.record(event(1), T0 + 3);
        acc.record(event(2), T0 + 9);
        assert!(acc.window().reader().is_empty());

        // late check: the next interval still starts at T0 + 10, not "now"
        acc.record(event(3), T0 + 12);
        let reader = acc.window().reader();
        let history = reader.snapshot_all();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].interval_start, T0);
        assert_eq!(history[0].received, 2);

        let current = acc.current();
        assert_eq!(current.interval_start, T0 + 10);
        assert_eq!(current.received, 1);
        assert_eq!(current.out_of_order, 0);
        assert_eq!(current.last_sequence, 3);
    }

    #[test]
    fn test_rollover_check_runs_for_discarded_events() {
        let mut acc = accumulator(5, 10);
        acc.record(event(50), T0);
        assert_eq!(acc.record(event(10), T0 + 10), Acceptance::Discarded);
        assert_eq!(acc.window().reader().len(), 1);
    }

    #[test]
    fn test_snapshot_count_follows_elapsed_time() {
        // floor(E / T) snapshots, one per elapsed interval, silent ones included
        let mut acc = accumulator(10, 2);
        assert_eq!(acc.roll_over(T0 + 1), 0);
        assert_eq!(acc.roll_over(T0 + 7), 3);
        assert_eq!(acc.window().reader().len(), 3);
        let starts: Vec<i64> = acc
            .window()
            .reader()
            .snapshot_all()
            .iter()
            .map(|s| s.interval_start)
            .collect();
        assert_eq!(starts, vec![T0, T0 + 2, T0 + 4]);
        assert_eq!(acc.current().interval_start, T0 + 6);

        // clock going backwards closes nothing
        assert_eq!(acc.roll_over(T0), 0);
    }

    #[test]
    fn test_clock_jump_is_bounded_by_capacity() {
        let mut acc = accumulator(3, 1);
        acc.record(event(7), T0);
        assert_eq!(acc.roll_over(T0 + 1_000_000), 3);
        let reader = acc.window().reader();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.latest().unwrap().interval_start, T0 + 999_999);
        assert_eq!(acc.current().interval_start, T0 + 1_000_000);
        assert_eq!(acc.current().last_sequence, 7);
    }

    #[test]
    fn test_three_and_a_half_seconds_of_clean_traffic() {
        // 50 probes, one every 70 ms, over 3.5 s with 1 s intervals and capacity 3
        let mut acc = accumulator(3, 1);
        for (k, sequence) in (1..=50u16).enumerate() {
            let millis = k as i64 * 70;
            acc.record(event(sequence), T0 + millis / 1000);
        }
        acc.roll_over(T0 + 3);

        let history = acc.window().reader().snapshot_all();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|s| s.out_of_order == 0));
        assert_eq!(
            history.iter().map(|s| s.received).collect::<Vec<_>>(),
            vec![15, 14, 14]
        );
        let total: u32 = history.iter().map(|s| s.received as u32).sum();
        assert!(total <= 50);
        assert_eq!(acc.current().received, 7);

        // a fourth close evicts the oldest
        acc.roll_over(T0 + 4);
        let history = acc.window().reader().snapshot_all();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].interval_start, T0 + 1);
        assert_eq!(history[2].received, 7);
    }

    #[tokio::test]
    async fn test_task_tracks_only_primary() {
        let window = HistoryWindow::new(3, 1).unwrap();
        let acc = StatsAccumulator::new(window, 3600, clock::unix_time());
        let (primary_tx, primary_rx) = mpsc::channel(8);
        let (secondary_tx, secondary_rx) = mpsc::channel(8);

        let task = tokio::spawn(run_accumulator(acc, primary_rx, secondary_rx));

        for sequence in [1, 2, 4] {
            primary_tx.send(DeliveryEvent { sequence, delay: 8 }).await.unwrap();
        }
        for sequence in 1..=20 {
            secondary_tx.send(DeliveryEvent { sequence, delay: 800 }).await.unwrap();
        }
        drop(secondary_tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(primary_tx);

        let acc = task.await.unwrap();
        let stats = acc.current();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.out_of_order, 1);
        assert_eq!(stats.cumulative_delay, 24);
        assert_eq!(stats.last_sequence, 4);
    }
}
