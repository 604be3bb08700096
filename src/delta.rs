//! Utilization from two consecutive counter samples.
//!
//! Everything here normalizes against the tick deltas that actually elapsed
//! between the two samples, never against the nominal 10 ms period, so a
//! late iteration still yields correct percentages.

use crate::index::IdentityIndex;
use crate::system::{CommName, CoreSample, ProcessSnapshot};

/// One process's share of the interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageRecord {
    pub pid: u32,
    pub name: CommName,
    /// Percent of all ticks elapsed across every core.
    pub percent: f64,
}

/// Busy percentage of one core over the interval; 0 when no ticks elapsed.
pub fn core_usage(prev: &CoreSample, cur: &CoreSample) -> f64 {
    let total = cur.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let idle = cur.idle.saturating_sub(prev.idle).min(total);
    100.0 * (total - idle) as f64 / total as f64
}

/// Per-core busy percentages into `out`, reusing its allocation.
pub fn core_usage_into(prev: &[CoreSample], cur: &[CoreSample], out: &mut Vec<f64>) {
    out.clear();
    out.extend(prev.iter().zip(cur).map(|(p, c)| core_usage(p, c)));
}

/// Ticks elapsed summed over all cores.
pub fn total_tick_delta(prev: &[CoreSample], cur: &[CoreSample]) -> u64 {
    prev.iter()
        .zip(cur)
        .map(|(p, c)| c.total.saturating_sub(p.total))
        .sum()
}

/// Percent of `total_delta` consumed between two tick readings of one pid.
///
/// A decrease means the pid now belongs to a different process and counts
/// as 0.
pub fn process_percent(prev_ticks: u64, cur_ticks: u64, total_delta: u64) -> f64 {
    if total_delta == 0 {
        return 0.0;
    }
    100.0 * cur_ticks.saturating_sub(prev_ticks) as f64 / total_delta as f64
}

/// Builds the usage records of every process present in both samples.
///
/// Processes first seen in `cur` have no baseline and produce no record.
pub fn process_usage_into(
    prev: &ProcessSnapshot,
    prev_index: &IdentityIndex,
    cur: &ProcessSnapshot,
    total_delta: u64,
    out: &mut Vec<UsageRecord>,
) {
    out.clear();
    for sample in cur.iter() {
        let Some(previous) = prev_index.get(sample.pid).and_then(|slot| prev.get(slot)) else {
            continue;
        };
        out.push(UsageRecord {
            pid: sample.pid,
            name: sample.name,
            percent: process_percent(previous.ticks, sample.ticks, total_delta),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::ProcessSample;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn core(idle: u64, total: u64) -> CoreSample {
        CoreSample { idle, total }
    }

    fn snapshot_of(entries: &[(u32, &str, u64)]) -> (ProcessSnapshot, IdentityIndex) {
        let mut snapshot = ProcessSnapshot::default();
        for &(pid, name, ticks) in entries {
            snapshot.push(ProcessSample {
                pid,
                name: CommName::new(name),
                ticks,
            });
        }
        let mut index = IdentityIndex::default();
        index.rebuild(&snapshot);
        (snapshot, index)
    }

    #[test]
    fn test_two_core_scenario() {
        let prev = [core(100, 200), core(50, 200)];
        let cur = [core(150, 300), core(100, 400)];

        let mut out = Vec::new();
        core_usage_into(&prev, &cur, &mut out);
        assert_eq!(out, vec![50.0, 75.0]);
        assert_eq!(total_tick_delta(&prev, &cur), 300);
    }

    #[test]
    fn test_zero_total_delta_is_zero_percent() {
        assert_eq!(core_usage(&core(10, 20), &core(10, 20)), 0.0);
        assert_eq!(core_usage(&core(10, 20), &core(15, 20)), 0.0);
        assert_eq!(process_percent(5, 50, 0), 0.0);
    }

    #[test]
    fn test_core_usage_bounded_for_monotonic_counters() {
        let mut rng = StdRng::seed_from_u64(0x2545_f491);
        for _ in 0..1000 {
            let total_delta: u64 = rng.gen_range(1..=5000);
            let idle_delta = rng.gen_range(0..=total_delta);
            let prev = core(1_000, 10_000);
            let cur = core(1_000 + idle_delta, 10_000 + total_delta);
            let usage = core_usage(&prev, &cur);
            assert!((0.0..=100.0).contains(&usage), "usage {} out of range", usage);
        }
    }

    #[test]
    fn test_idle_running_ahead_of_total_is_clamped() {
        let usage = core_usage(&core(0, 100), &core(500, 200));
        assert_eq!(usage, 0.0);
    }

    #[test]
    fn test_counters_going_backwards_do_not_wrap() {
        assert_eq!(core_usage(&core(100, 1000), &core(0, 10)), 0.0);
        assert_eq!(total_tick_delta(&[core(0, 1000)], &[core(0, 10)]), 0);
    }

    #[test]
    fn test_process_scenario() {
        let (prev, prev_index) = snapshot_of(&[(1, "a", 1000), (2, "b", 500)]);
        let (cur, _) = snapshot_of(&[(2, "b", 550), (1, "a", 1100)]);

        let mut out = Vec::new();
        process_usage_into(&prev, &prev_index, &cur, 200, &mut out);

        assert_eq!(out.len(), 2);
        let a = out.iter().find(|r| r.pid == 1).unwrap();
        let b = out.iter().find(|r| r.pid == 2).unwrap();
        assert_eq!(a.percent, 50.0);
        assert_eq!(a.name.as_str(), "a");
        assert_eq!(b.percent, 25.0);
    }

    #[test]
    fn test_first_seen_process_is_excluded() {
        let (prev, prev_index) = snapshot_of(&[(1, "old", 10)]);
        let (cur, _) = snapshot_of(&[(1, "old", 20), (99, "new", 5000)]);

        let mut out = Vec::new();
        process_usage_into(&prev, &prev_index, &cur, 100, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 1);
    }

    #[test]
    fn test_reused_pid_with_fewer_ticks_is_zero() {
        let (prev, prev_index) = snapshot_of(&[(77, "old-owner", 9000)]);
        let (cur, _) = snapshot_of(&[(77, "new-owner", 3)]);

        let mut out = Vec::new();
        process_usage_into(&prev, &prev_index, &cur, 100, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].percent, 0.0);
        assert_eq!(out[0].name.as_str(), "new-owner");
    }

    #[test]
    fn test_output_buffer_is_reused() {
        let (prev, prev_index) = snapshot_of(&[(1, "a", 0), (2, "b", 0)]);
        let (cur, _) = snapshot_of(&[(1, "a", 1)]);

        let mut out = Vec::with_capacity(16);
        out.push(UsageRecord {
            pid: 500,
            name: CommName::new("stale"),
            percent: 99.0,
        });
        process_usage_into(&prev, &prev_index, &cur, 10, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 1);
        assert!(out.capacity() >= 16);
    }
}
