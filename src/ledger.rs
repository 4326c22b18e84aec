//! Declaration retention and per-partition index accounting.
//!
//! OBJ face indices are global: the 40th `v` line in the file is vertex 40
//! no matter which group it lands in. Splitting the file into self-contained
//! partitions therefore needs, for every partition, a record of which global
//! declarations it holds and at which local position. Groups may be revisited
//! non-contiguously and faces may reference declarations from a shared pool,
//! so a single counter snapshot is not enough: the ledger maps each routed
//! global index to the partition-local index it was written at, and the
//! driver retains every declaration line so a face referencing a shared
//! declaration can have it carried into its own partition.

use std::collections::HashMap;

use crate::error::{Result, SplitError};

/// Which declaration pool an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Vertex,
    Texcoord,
    Normal,
}

impl IndexKind {
    fn slot(self) -> usize {
        match self {
            IndexKind::Vertex => 0,
            IndexKind::Texcoord => 1,
            IndexKind::Normal => 2,
        }
    }
}

/// Every declaration line read so far, per kind, owned by the driver.
///
/// Retained so that a face referencing a declaration routed to another
/// partition can have it copied into its own (the output must be valid in
/// isolation). Global indices are 1-based, matching the source numbering.
#[derive(Debug, Default)]
pub struct DeclPool {
    pools: [Vec<String>; 3],
}

impl DeclPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain one declaration line; returns its global index.
    pub fn push(&mut self, kind: IndexKind, line: &str) -> u64 {
        let pool = &mut self.pools[kind.slot()];
        pool.push(line.to_string());
        pool.len() as u64
    }

    /// The declaration line at a 1-based global index.
    pub fn line(&self, kind: IndexKind, global: u64) -> Option<&str> {
        if global == 0 {
            return None;
        }
        self.pools[kind.slot()]
            .get(global as usize - 1)
            .map(String::as_str)
    }

    /// How many declarations of `kind` have been read.
    pub fn count(&self, kind: IndexKind) -> u64 {
        self.pools[kind.slot()].len() as u64
    }
}

/// Per-partition declaration accounting.
#[derive(Debug, Default)]
struct PartitionIndex {
    /// Declarations of each kind written to this partition so far; local
    /// indices run 1..=count.
    counts: [u64; 3],
    /// Global index to the local index it was written at, per kind.
    locals: [HashMap<u64, u64>; 3],
}

/// Tracks, for every partition, which global declarations it holds and
/// where.
#[derive(Debug, Default)]
pub struct IndexLedger {
    entries: HashMap<String, PartitionIndex>,
}

impl IndexLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accounting for `partition`.
    ///
    /// Idempotent: re-opening an already-open partition keeps its counts
    /// (re-emitting a group marker is a section delimiter, not a new
    /// section).
    pub fn open(&mut self, partition: &str) {
        self.entries.entry(partition.to_string()).or_default();
    }

    /// Whether `partition` has an entry.
    pub fn is_open(&self, partition: &str) -> bool {
        self.entries.contains_key(partition)
    }

    /// Note that the declaration at `global` was written to `partition`;
    /// returns its partition-local index.
    pub fn record(&mut self, partition: &str, kind: IndexKind, global: u64) -> Result<u64> {
        let entry = self
            .entries
            .get_mut(partition)
            .ok_or_else(|| SplitError::LedgerUnopened(partition.to_string()))?;
        let slot = kind.slot();
        entry.counts[slot] += 1;
        let local = entry.counts[slot];
        entry.locals[slot].insert(global, local);
        Ok(local)
    }

    /// The local index `global` was written at in `partition`, or `None`
    /// if that declaration was never routed there.
    pub fn local_index(&self, partition: &str, kind: IndexKind, global: u64) -> Result<Option<u64>> {
        let entry = self
            .entries
            .get(partition)
            .ok_or_else(|| SplitError::LedgerUnopened(partition.to_string()))?;
        Ok(entry.locals[kind.slot()].get(&global).copied())
    }

    /// Fold `src`'s accounting into `dst`, keeping `dst`'s existing content
    /// first: `src`'s local indices are shifted past `dst`'s counts, which
    /// matches the writer appending `src`'s records after `dst`'s.
    pub fn merge(&mut self, src: &str, dst: &str) {
        let Some(source) = self.entries.remove(src) else {
            return;
        };
        let target = self.entries.entry(dst.to_string()).or_default();
        for slot in 0..3 {
            let offset = target.counts[slot];
            for (global, local) in &source.locals[slot] {
                target.locals[slot].insert(*global, local + offset);
            }
            target.counts[slot] += source.counts[slot];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_assigns_sequential_locals() {
        let mut ledger = IndexLedger::new();
        ledger.open("wall");
        assert_eq!(ledger.record("wall", IndexKind::Vertex, 11).unwrap(), 1);
        assert_eq!(ledger.record("wall", IndexKind::Vertex, 12).unwrap(), 2);
        assert_eq!(ledger.record("wall", IndexKind::Texcoord, 5).unwrap(), 1);

        assert_eq!(ledger.local_index("wall", IndexKind::Vertex, 12).unwrap(), Some(2));
        assert_eq!(ledger.local_index("wall", IndexKind::Texcoord, 5).unwrap(), Some(1));
        assert_eq!(ledger.local_index("wall", IndexKind::Vertex, 5).unwrap(), None);
    }

    #[test]
    fn test_locals_track_routing_not_global_position() {
        // Declarations routed elsewhere in between do not widen the gap:
        // globals 3 and 9 sit at locals 1 and 2.
        let mut ledger = IndexLedger::new();
        ledger.open("a");
        ledger.open("b");
        ledger.record("a", IndexKind::Vertex, 3).unwrap();
        for global in 4..9 {
            ledger.record("b", IndexKind::Vertex, global).unwrap();
        }
        assert_eq!(ledger.record("a", IndexKind::Vertex, 9).unwrap(), 2);
        assert_eq!(ledger.local_index("a", IndexKind::Vertex, 9).unwrap(), Some(2));
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let mut ledger = IndexLedger::new();
        ledger.open("wall");
        ledger.record("wall", IndexKind::Vertex, 1).unwrap();
        ledger.open("wall");
        assert_eq!(ledger.record("wall", IndexKind::Vertex, 2).unwrap(), 2);
    }

    #[test]
    fn test_unopened_partition_is_fatal() {
        let ledger = IndexLedger::new();
        let err = ledger.local_index("ghost", IndexKind::Vertex, 1).unwrap_err();
        assert!(matches!(err, SplitError::LedgerUnopened(_)));
        let mut ledger = IndexLedger::new();
        let err = ledger.record("ghost", IndexKind::Vertex, 1).unwrap_err();
        assert!(matches!(err, SplitError::LedgerUnopened(_)));
    }

    #[test]
    fn test_merge_shifts_source_past_destination() {
        let mut ledger = IndexLedger::new();
        ledger.open("dst");
        ledger.open("src");
        ledger.record("dst", IndexKind::Vertex, 1).unwrap();
        ledger.record("dst", IndexKind::Vertex, 2).unwrap();
        ledger.record("src", IndexKind::Vertex, 7).unwrap();
        ledger.merge("src", "dst");

        assert!(!ledger.is_open("src"));
        assert_eq!(ledger.local_index("dst", IndexKind::Vertex, 7).unwrap(), Some(3));
        assert_eq!(ledger.record("dst", IndexKind::Vertex, 8).unwrap(), 4);
    }

    #[test]
    fn test_merge_into_new_partition_keeps_locals() {
        let mut ledger = IndexLedger::new();
        ledger.open("default");
        ledger.record("default", IndexKind::Vertex, 1).unwrap();
        ledger.record("default", IndexKind::Vertex, 2).unwrap();
        ledger.merge("default", "first_group");
        assert_eq!(
            ledger.local_index("first_group", IndexKind::Vertex, 2).unwrap(),
            Some(2)
        );
    }

    #[test]
    fn test_pool_retains_lines_by_global_index() {
        let mut pool = DeclPool::new();
        assert_eq!(pool.push(IndexKind::Vertex, "v 0 0 0"), 1);
        assert_eq!(pool.push(IndexKind::Vertex, "v 1 0 0"), 2);
        assert_eq!(pool.push(IndexKind::Normal, "vn 0 0 1"), 1);

        assert_eq!(pool.line(IndexKind::Vertex, 2), Some("v 1 0 0"));
        assert_eq!(pool.line(IndexKind::Normal, 1), Some("vn 0 0 1"));
        assert_eq!(pool.line(IndexKind::Vertex, 3), None);
        assert_eq!(pool.line(IndexKind::Vertex, 0), None);
        assert_eq!(pool.count(IndexKind::Vertex), 2);
    }
}
