//! Partial selection of the busiest processes.
//!
//! A busy host has thousands of processes and only five get printed, so the
//! records are partitioned around the k-th largest (expected linear time)
//! and only the first k are sorted.

use std::cmp::Ordering;

use crate::delta::UsageRecord;

/// Processes printed per interval.
pub const TOP_K: usize = 5;

/// Descending by usage, ascending pid among equal usage.
fn busiest_first(a: &UsageRecord, b: &UsageRecord) -> Ordering {
    b.percent
        .total_cmp(&a.percent)
        .then_with(|| a.pid.cmp(&b.pid))
}

/// Moves the `k` busiest records to the front of `records`, sorted
/// descending, and returns them. The tail is left in unspecified order.
pub fn select_top(records: &mut [UsageRecord], k: usize) -> &[UsageRecord] {
    let n = k.min(records.len());
    if n == 0 {
        return &[];
    }

    if records.len() > n {
        records.select_nth_unstable_by(n - 1, busiest_first);
    }
    records[..n].sort_unstable_by(busiest_first);
    &records[..n]
}

/// The [`TOP_K`] busiest records, busiest first.
pub fn top5(records: &mut [UsageRecord]) -> &[UsageRecord] {
    select_top(records, TOP_K)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::CommName;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn records(percents: &[f64]) -> Vec<UsageRecord> {
        percents
            .iter()
            .enumerate()
            .map(|(i, &percent)| UsageRecord {
                pid: 1000 + i as u32,
                name: CommName::new("proc"),
                percent,
            })
            .collect()
    }

    fn percents(top: &[UsageRecord]) -> Vec<f64> {
        top.iter().map(|r| r.percent).collect()
    }

    #[test]
    fn test_seven_processes() {
        let mut input = records(&[90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0]);
        assert_eq!(
            percents(top5(&mut input)),
            vec![90.0, 80.0, 70.0, 60.0, 50.0]
        );

        let mut shuffled = records(&[40.0, 90.0, 30.0, 60.0, 80.0, 50.0, 70.0]);
        assert_eq!(
            percents(top5(&mut shuffled)),
            vec![90.0, 80.0, 70.0, 60.0, 50.0]
        );
    }

    #[test]
    fn test_five_or_fewer_are_just_sorted() {
        let mut input = records(&[1.0, 3.0, 2.0]);
        assert_eq!(percents(top5(&mut input)), vec![3.0, 2.0, 1.0]);

        let mut exactly_five = records(&[5.0, 1.0, 4.0, 2.0, 3.0]);
        assert_eq!(
            percents(top5(&mut exactly_five)),
            vec![5.0, 4.0, 3.0, 2.0, 1.0]
        );

        let mut empty: Vec<UsageRecord> = Vec::new();
        assert!(top5(&mut empty).is_empty());
    }

    #[test]
    fn test_selected_dominate_excluded() {
        let mut rng = StdRng::seed_from_u64(0x9e37_79b9);
        let values: Vec<f64> = (0..3000)
            .map(|_| rng.gen_range(0..1000) as f64 / 10.0)
            .collect();

        let mut input = records(&values);
        let top: Vec<UsageRecord> = top5(&mut input).to_vec();
        assert_eq!(top.len(), TOP_K);

        for pair in top.windows(2) {
            assert!(pair[0].percent >= pair[1].percent);
        }
        let weakest = top[TOP_K - 1].percent;
        for excluded in &input[TOP_K..] {
            assert!(excluded.percent <= weakest);
        }

        let mut expected = values.clone();
        expected.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(percents(&top), expected[..TOP_K].to_vec());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let values = [10.0, 10.0, 10.0, 5.0, 10.0, 10.0, 10.0, 0.0];
        let mut first = records(&values);
        let mut second = records(&values);

        let a: Vec<u32> = top5(&mut first).iter().map(|r| r.pid).collect();
        let b: Vec<u32> = top5(&mut second).iter().map(|r| r.pid).collect();
        assert_eq!(a, b);
        assert_eq!(a, vec![1000, 1001, 1002, 1004, 1005]);
    }

    #[test]
    fn test_rerunning_on_same_input_is_stable() {
        let mut input = records(&[3.0, 9.0, 1.0, 7.0, 7.0, 2.0, 8.0, 0.5]);
        let once: Vec<f64> = percents(top5(&mut input));
        let twice: Vec<f64> = percents(top5(&mut input));
        assert_eq!(once, twice);
        assert_eq!(once, vec![9.0, 8.0, 7.0, 7.0, 3.0]);
    }

    #[test]
    fn test_select_top_custom_k() {
        let mut input = records(&[1.0, 4.0, 2.0, 3.0]);
        assert_eq!(percents(select_top(&mut input, 2)), vec![4.0, 3.0]);
        assert!(select_top(&mut input, 0).is_empty());
    }
}
