//! Capability surface the engine requires from a backing store: hashes,
//! sets, score-ranked sorted sets, weighted intersection, TTLs, and an
//! atomic multi-key batch. A remote store (e.g. Redis) fits behind the same
//! trait; the two reference backends here are an in-memory table and a
//! SQLite file.

use crate::error::Result;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Write operations that can be enqueued into an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BatchOp {
    HashSet { key: String, field: String, value: String },
    HashDelete { key: String, field: String },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    SortedSetAdd { key: String, score: f64, member: String },
    SortedSetRemove { key: String, member: String },
    Delete { key: String },
}

/// An ordered group of writes applied as one unit: no concurrent reader
/// observes a partial subset. Batches give no isolation across each other.
#[derive(Debug, Default)]
pub struct Batch {
    pub(crate) ops: Vec<BatchOp>,
}

impl Batch {
    pub fn hash_set(&mut self, key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) {
        self.ops.push(BatchOp::HashSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        });
    }

    pub fn hash_delete(&mut self, key: impl Into<String>, field: impl Into<String>) {
        self.ops.push(BatchOp::HashDelete {
            key: key.into(),
            field: field.into(),
        });
    }

    pub fn set_add(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.ops.push(BatchOp::SetAdd {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn set_remove(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.ops.push(BatchOp::SetRemove {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn sorted_set_add(&mut self, key: impl Into<String>, score: f64, member: impl Into<String>) {
        self.ops.push(BatchOp::SortedSetAdd {
            key: key.into(),
            score,
            member: member.into(),
        });
    }

    pub fn sorted_set_remove(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.ops.push(BatchOp::SortedSetRemove {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Store contract consumed by [`Loader`](crate::Loader) and
/// [`Matcher`](crate::Matcher).
///
/// Semantics follow the usual sorted-set conventions: ranges rank by score
/// descending with ties broken by member ascending; negative range indices
/// count from the end (`stop = -1` means through the last element); a
/// set/sorted-set/hash whose last entry is removed stops existing.
pub trait IndexStore {
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;
    fn hash_delete(&self, key: &str, field: &str) -> Result<()>;
    /// Values aligned with the input fields; missing entries are `None`.
    fn hash_multi_get(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>>;

    fn set_add(&self, key: &str, member: &str) -> Result<()>;
    fn set_remove(&self, key: &str, member: &str) -> Result<()>;
    fn set_members(&self, key: &str) -> Result<Vec<String>>;

    fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<()>;
    fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()>;
    fn sorted_set_range_desc(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// Weighted intersection (weight 1, SUM aggregation) of `sources`
    /// written into `dest`, replacing it and clearing any TTL on it. An
    /// empty intersection deletes `dest`.
    fn intersect_weighted(&self, dest: &str, sources: &[String]) -> Result<()>;

    /// Sets a TTL on an existing key; no-op when the key is absent.
    fn expire(&self, key: &str, ttl_secs: u64) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    fn exists(&self, key: &str) -> Result<bool>;

    /// Applies every enqueued write as one atomic unit.
    fn run_batch(&self, batch: Batch) -> Result<()>;
}

/// Resolves Redis-style range indices against a collection of `len`
/// elements. Returns `None` when the resolved window is empty.
pub(crate) fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_range_handles_negative_and_clamped_indices() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, 0, 2), Some((0, 2)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, 0, 99), Some((0, 4)));
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(5, 9, 12), None);
    }

    #[test]
    fn batch_records_operations_in_order() {
        let mut batch = Batch::default();
        assert!(batch.is_empty());
        batch.hash_set("data", "1", "{}");
        batch.set_add("index", "te");
        batch.sorted_set_add("index:te", 10.0, "1");
        batch.delete("index:old");
        assert_eq!(batch.len(), 4);
        assert!(matches!(batch.ops[0], BatchOp::HashSet { .. }));
        assert!(matches!(batch.ops[3], BatchOp::Delete { .. }));
    }
}
