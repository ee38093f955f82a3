use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{Result, TypeaheadError};
use crate::store::{Batch, BatchOp, IndexStore, resolve_range};

/// In-memory reference store. A cheap `Clone` handle over shared tables,
/// usable from concurrent callers; a batch holds the table lock for its
/// whole application, which is what makes it atomic.
///
/// TTLs are purged lazily: an expired key is dropped the next time any
/// operation touches it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    entries: HashMap<String, Entry>,
    deadlines_ms: HashMap<String, i64>,
}

#[derive(Debug)]
enum Entry {
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    Sorted(HashMap<String, f64>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::Sorted(_) => "sorted set",
        }
    }
}

fn wrong_kind(key: &str, want: &str, got: &str) -> TypeaheadError {
    TypeaheadError::StoreUnavailable(format!(
        "wrong value kind at key '{key}': holds {got}, operation needs {want}"
    ))
}

impl Tables {
    fn purge(&mut self, key: &str, now_ms: i64) {
        if let Some(deadline) = self.deadlines_ms.get(key)
            && *deadline <= now_ms
        {
            self.deadlines_ms.remove(key);
            self.entries.remove(key);
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut HashMap<String, String>> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()))
        {
            Entry::Hash(fields) => Ok(fields),
            other => Err(wrong_kind(key, "hash", other.kind())),
        }
    }

    fn set_mut(&mut self, key: &str) -> Result<&mut BTreeSet<String>> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(members) => Ok(members),
            other => Err(wrong_kind(key, "set", other.kind())),
        }
    }

    fn sorted_mut(&mut self, key: &str) -> Result<&mut HashMap<String, f64>> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Sorted(HashMap::new()))
        {
            Entry::Sorted(members) => Ok(members),
            other => Err(wrong_kind(key, "sorted set", other.kind())),
        }
    }

    fn drop_if_empty(&mut self, key: &str) {
        let empty = match self.entries.get(key) {
            Some(Entry::Hash(fields)) => fields.is_empty(),
            Some(Entry::Set(members)) => members.is_empty(),
            Some(Entry::Sorted(members)) => members.is_empty(),
            None => false,
        };
        if empty {
            self.entries.remove(key);
            self.deadlines_ms.remove(key);
        }
    }

    fn apply(&mut self, op: &BatchOp, now_ms: i64) -> Result<()> {
        match op {
            BatchOp::HashSet { key, field, value } => {
                self.purge(key, now_ms);
                self.hash_mut(key)?.insert(field.clone(), value.clone());
            }
            BatchOp::HashDelete { key, field } => {
                self.purge(key, now_ms);
                if let Some(Entry::Hash(fields)) = self.entries.get_mut(key) {
                    fields.remove(field);
                    self.drop_if_empty(key);
                }
            }
            BatchOp::SetAdd { key, member } => {
                self.purge(key, now_ms);
                self.set_mut(key)?.insert(member.clone());
            }
            BatchOp::SetRemove { key, member } => {
                self.purge(key, now_ms);
                if let Some(Entry::Set(members)) = self.entries.get_mut(key) {
                    members.remove(member);
                    self.drop_if_empty(key);
                }
            }
            BatchOp::SortedSetAdd { key, score, member } => {
                self.purge(key, now_ms);
                self.sorted_mut(key)?.insert(member.clone(), *score);
            }
            BatchOp::SortedSetRemove { key, member } => {
                self.purge(key, now_ms);
                if let Some(Entry::Sorted(members)) = self.entries.get_mut(key) {
                    members.remove(member);
                    self.drop_if_empty(key);
                }
            }
            BatchOp::Delete { key } => {
                self.entries.remove(key);
                self.deadlines_ms.remove(key);
            }
        }
        Ok(())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Score descending, member ascending on ties.
fn rank_desc(members: &HashMap<String, f64>) -> Vec<String> {
    let mut ranked: Vec<(&String, f64)> = members.iter().map(|(m, s)| (m, *s)).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    ranked.into_iter().map(|(m, _)| m.clone()).collect()
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| TypeaheadError::mutex_poisoned("memory store"))
    }
}

impl IndexStore for MemoryStore {
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        tables.apply(
            &BatchOp::HashSet {
                key: key.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            },
            now,
        )
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut tables = self.lock()?;
        tables.purge(key, now_ms());
        match tables.entries.get(key) {
            Some(Entry::Hash(fields)) => Ok(fields.get(field).cloned()),
            Some(other) => Err(wrong_kind(key, "hash", other.kind())),
            None => Ok(None),
        }
    }

    fn hash_delete(&self, key: &str, field: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        tables.apply(
            &BatchOp::HashDelete {
                key: key.to_string(),
                field: field.to_string(),
            },
            now,
        )
    }

    fn hash_multi_get(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        let mut tables = self.lock()?;
        tables.purge(key, now_ms());
        match tables.entries.get(key) {
            Some(Entry::Hash(stored)) => {
                Ok(fields.iter().map(|field| stored.get(field).cloned()).collect())
            }
            Some(other) => Err(wrong_kind(key, "hash", other.kind())),
            None => Ok(vec![None; fields.len()]),
        }
    }

    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        tables.apply(
            &BatchOp::SetAdd {
                key: key.to_string(),
                member: member.to_string(),
            },
            now,
        )
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        tables.apply(
            &BatchOp::SetRemove {
                key: key.to_string(),
                member: member.to_string(),
            },
            now,
        )
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut tables = self.lock()?;
        tables.purge(key, now_ms());
        match tables.entries.get(key) {
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(other) => Err(wrong_kind(key, "set", other.kind())),
            None => Ok(Vec::new()),
        }
    }

    fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        tables.apply(
            &BatchOp::SortedSetAdd {
                key: key.to_string(),
                score,
                member: member.to_string(),
            },
            now,
        )
    }

    fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        tables.apply(
            &BatchOp::SortedSetRemove {
                key: key.to_string(),
                member: member.to_string(),
            },
            now,
        )
    }

    fn sorted_set_range_desc(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut tables = self.lock()?;
        tables.purge(key, now_ms());
        let ranked = match tables.entries.get(key) {
            Some(Entry::Sorted(members)) => rank_desc(members),
            Some(other) => return Err(wrong_kind(key, "sorted set", other.kind())),
            None => return Ok(Vec::new()),
        };
        let Some((from, to)) = resolve_range(ranked.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(ranked[from..=to].to_vec())
    }

    fn intersect_weighted(&self, dest: &str, sources: &[String]) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        for key in sources {
            tables.purge(key, now);
        }

        let mut combined: Option<HashMap<String, f64>> = None;
        for key in sources {
            let members = match tables.entries.get(key) {
                Some(Entry::Sorted(members)) => members.clone(),
                Some(other) => return Err(wrong_kind(key, "sorted set", other.kind())),
                None => HashMap::new(),
            };
            combined = Some(match combined {
                None => members,
                Some(acc) => acc
                    .into_iter()
                    .filter_map(|(member, score)| {
                        members.get(&member).map(|s| (member, score + s))
                    })
                    .collect(),
            });
        }

        tables.deadlines_ms.remove(dest);
        match combined {
            Some(result) if !result.is_empty() => {
                tables.entries.insert(dest.to_string(), Entry::Sorted(result));
            }
            _ => {
                tables.entries.remove(dest);
            }
        }
        Ok(())
    }

    fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        tables.purge(key, now);
        if tables.entries.contains_key(key) {
            let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
            tables.deadlines_ms.insert(key.to_string(), now.saturating_add(ttl_ms));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut tables = self.lock()?;
        tables.entries.remove(key);
        tables.deadlines_ms.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let mut tables = self.lock()?;
        tables.purge(key, now_ms());
        Ok(tables.entries.contains_key(key))
    }

    fn run_batch(&self, batch: Batch) -> Result<()> {
        let mut tables = self.lock()?;
        let now = now_ms();
        for op in &batch.ops {
            tables.apply(op, now)?;
        }
        Ok(())
    }
}
