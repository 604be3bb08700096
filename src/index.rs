//! Pid lookup into a process snapshot.

use ahash::AHashMap as HashMap;

use crate::system::ProcessSnapshot;

/// Maps pid -> slot within the snapshot it was built from.
///
/// Only meaningful for that one snapshot; it is rebuilt from scratch every
/// time the snapshot is refilled.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    slots: HashMap<u32, usize>,
}

impl IdentityIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
        }
    }

    /// Discards every entry and indexes `snapshot`.
    ///
    /// The table keeps its buckets, so its size tracks the largest snapshot
    /// seen rather than growing with every rebuild.
    pub fn rebuild(&mut self, snapshot: &ProcessSnapshot) {
        self.slots.clear();
        self.slots.extend(
            snapshot
                .iter()
                .enumerate()
                .map(|(slot, sample)| (sample.pid, slot)),
        );
    }

    pub fn get(&self, pid: u32) -> Option<usize> {
        self.slots.get(&pid).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{CommName, ProcessSample};

    fn snapshot_of(pids: &[u32]) -> ProcessSnapshot {
        let mut snapshot = ProcessSnapshot::default();
        for &pid in pids {
            snapshot.push(ProcessSample {
                pid,
                name: CommName::new("p"),
                ticks: pid as u64 * 10,
            });
        }
        snapshot
    }

    #[test]
    fn test_lookup_returns_slot_of_pid() {
        let snapshot = snapshot_of(&[300, 1, 4242]);
        let mut index = IdentityIndex::default();
        index.rebuild(&snapshot);

        assert_eq!(index.len(), 3);
        assert_eq!(index.get(300), Some(0));
        assert_eq!(index.get(1), Some(1));
        assert_eq!(index.get(4242), Some(2));
        assert_eq!(index.get(2), None);

        let slot = index.get(4242).unwrap();
        assert_eq!(snapshot.get(slot).unwrap().ticks, 42420);
    }

    #[test]
    fn test_rebuild_discards_previous_entries() {
        let mut index = IdentityIndex::with_capacity(8);
        index.rebuild(&snapshot_of(&[10, 11, 12]));
        index.rebuild(&snapshot_of(&[12, 13]));

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(10), None);
        assert_eq!(index.get(11), None);
        assert_eq!(index.get(12), Some(0));
        assert_eq!(index.get(13), Some(1));

        index.rebuild(&ProcessSnapshot::default());
        assert!(index.is_empty());
    }

    #[test]
    fn test_many_pids_colliding_modulo_table_size() {
        let pids: Vec<u32> = (0..64).map(|i| 7 + i * 1024).collect();
        let mut index = IdentityIndex::default();
        index.rebuild(&snapshot_of(&pids));

        for (slot, pid) in pids.iter().enumerate() {
            assert_eq!(index.get(*pid), Some(slot));
        }
    }
}
