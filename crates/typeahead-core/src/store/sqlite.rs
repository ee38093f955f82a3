use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, TypeaheadError};
use crate::store::{Batch, BatchOp, IndexStore, resolve_range};

/// SQLite-backed store: hash/set/sorted-set tables plus a TTL deadline
/// table, one file per deployment. A `Clone` handle shares the connection;
/// batches and weighted intersections run inside a single transaction, which
/// is what makes them atomic. Durability belongs to SQLite.
///
/// TTLs are stored as epoch-millisecond deadlines and purged lazily when an
/// operation touches the key.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| TypeaheadError::mutex_poisoned("sqlite"))?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| TypeaheadError::mutex_poisoned("sqlite"))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        drop(conn);
        Ok(value)
    }

    fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode = WAL;

                CREATE TABLE IF NOT EXISTS hashes (
                    key TEXT NOT NULL,
                    field TEXT NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (key, field)
                );

                CREATE TABLE IF NOT EXISTS sets (
                    key TEXT NOT NULL,
                    member TEXT NOT NULL,
                    PRIMARY KEY (key, member)
                );

                CREATE TABLE IF NOT EXISTS zsets (
                    key TEXT NOT NULL,
                    member TEXT NOT NULL,
                    score REAL NOT NULL,
                    PRIMARY KEY (key, member)
                );

                CREATE TABLE IF NOT EXISTS deadlines (
                    key TEXT PRIMARY KEY,
                    expires_at_ms INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_zsets_key_score
                ON zsets(key, score DESC, member ASC);
                "#,
            )?;
            Ok(())
        })
    }
}

fn purge_expired(conn: &Connection, key: &str, now_ms: i64) -> Result<()> {
    let expired = conn
        .query_row(
            "SELECT expires_at_ms FROM deadlines WHERE key = ?1 AND expires_at_ms <= ?2",
            params![key, now_ms],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if expired {
        drop_key(conn, key)?;
    }
    Ok(())
}

fn drop_key(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM hashes WHERE key = ?1", params![key])?;
    conn.execute("DELETE FROM sets WHERE key = ?1", params![key])?;
    conn.execute("DELETE FROM zsets WHERE key = ?1", params![key])?;
    conn.execute("DELETE FROM deadlines WHERE key = ?1", params![key])?;
    Ok(())
}

fn key_exists(conn: &Connection, key: &str) -> Result<bool> {
    let found = conn
        .query_row(
            r"
            SELECT 1 WHERE EXISTS (SELECT 1 FROM hashes WHERE key = ?1)
                OR EXISTS (SELECT 1 FROM sets WHERE key = ?1)
                OR EXISTS (SELECT 1 FROM zsets WHERE key = ?1)
            ",
            params![key],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn sorted_members(conn: &Connection, key: &str) -> Result<HashMap<String, f64>> {
    let mut stmt = conn.prepare("SELECT member, score FROM zsets WHERE key = ?1")?;
    let rows = stmt.query_map(params![key], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;
    let mut members = HashMap::new();
    for row in rows {
        let (member, score) = row?;
        members.insert(member, score);
    }
    Ok(members)
}

fn apply_op(conn: &Connection, op: &BatchOp, now_ms: i64) -> Result<()> {
    match op {
        BatchOp::HashSet { key, field, value } => {
            purge_expired(conn, key, now_ms)?;
            conn.execute(
                r"
                INSERT INTO hashes(key, field, value) VALUES (?1, ?2, ?3)
                ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
                ",
                params![key, field, value],
            )?;
        }
        BatchOp::HashDelete { key, field } => {
            purge_expired(conn, key, now_ms)?;
            conn.execute(
                "DELETE FROM hashes WHERE key = ?1 AND field = ?2",
                params![key, field],
            )?;
        }
        BatchOp::SetAdd { key, member } => {
            purge_expired(conn, key, now_ms)?;
            conn.execute(
                "INSERT OR IGNORE INTO sets(key, member) VALUES (?1, ?2)",
                params![key, member],
            )?;
        }
        BatchOp::SetRemove { key, member } => {
            purge_expired(conn, key, now_ms)?;
            conn.execute(
                "DELETE FROM sets WHERE key = ?1 AND member = ?2",
                params![key, member],
            )?;
        }
        BatchOp::SortedSetAdd { key, score, member } => {
            purge_expired(conn, key, now_ms)?;
            conn.execute(
                r"
                INSERT INTO zsets(key, member, score) VALUES (?1, ?2, ?3)
                ON CONFLICT(key, member) DO UPDATE SET score = excluded.score
                ",
                params![key, member, score],
            )?;
        }
        BatchOp::SortedSetRemove { key, member } => {
            purge_expired(conn, key, now_ms)?;
            conn.execute(
                "DELETE FROM zsets WHERE key = ?1 AND member = ?2",
                params![key, member],
            )?;
        }
        BatchOp::Delete { key } => {
            drop_key(conn, key)?;
        }
    }
    Ok(())
}

impl IndexStore for SqliteStore {
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            apply_op(
                conn,
                &BatchOp::HashSet {
                    key: key.to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                },
                now_ms(),
            )
        })
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            purge_expired(conn, key, now_ms())?;
            let value = conn
                .query_row(
                    "SELECT value FROM hashes WHERE key = ?1 AND field = ?2",
                    params![key, field],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn hash_delete(&self, key: &str, field: &str) -> Result<()> {
        self.with_conn(|conn| {
            apply_op(
                conn,
                &BatchOp::HashDelete {
                    key: key.to_string(),
                    field: field.to_string(),
                },
                now_ms(),
            )
        })
    }

    fn hash_multi_get(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        self.with_conn(|conn| {
            purge_expired(conn, key, now_ms())?;
            let mut stmt =
                conn.prepare("SELECT value FROM hashes WHERE key = ?1 AND field = ?2")?;
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                let value = stmt
                    .query_row(params![key, field], |row| row.get::<_, String>(0))
                    .optional()?;
                values.push(value);
            }
            Ok(values)
        })
    }

    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        self.with_conn(|conn| {
            apply_op(
                conn,
                &BatchOp::SetAdd {
                    key: key.to_string(),
                    member: member.to_string(),
                },
                now_ms(),
            )
        })
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        self.with_conn(|conn| {
            apply_op(
                conn,
                &BatchOp::SetRemove {
                    key: key.to_string(),
                    member: member.to_string(),
                },
                now_ms(),
            )
        })
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            purge_expired(conn, key, now_ms())?;
            let mut stmt =
                conn.prepare("SELECT member FROM sets WHERE key = ?1 ORDER BY member ASC")?;
            let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
            let mut members = Vec::new();
            for row in rows {
                members.push(row?);
            }
            Ok(members)
        })
    }

    fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.with_conn(|conn| {
            apply_op(
                conn,
                &BatchOp::SortedSetAdd {
                    key: key.to_string(),
                    score,
                    member: member.to_string(),
                },
                now_ms(),
            )
        })
    }

    fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()> {
        self.with_conn(|conn| {
            apply_op(
                conn,
                &BatchOp::SortedSetRemove {
                    key: key.to_string(),
                    member: member.to_string(),
                },
                now_ms(),
            )
        })
    }

    fn sorted_set_range_desc(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            purge_expired(conn, key, now_ms())?;
            let mut stmt = conn.prepare(
                "SELECT member FROM zsets WHERE key = ?1 ORDER BY score DESC, member ASC",
            )?;
            let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
            let mut ranked = Vec::new();
            for row in rows {
                ranked.push(row?);
            }
            let Some((from, to)) = resolve_range(ranked.len(), start, stop) else {
                return Ok(Vec::new());
            };
            Ok(ranked[from..=to].to_vec())
        })
    }

    fn intersect_weighted(&self, dest: &str, sources: &[String]) -> Result<()> {
        self.with_tx(|tx| {
            let now = now_ms();
            for key in sources {
                purge_expired(tx, key, now)?;
            }
            tx.execute("DELETE FROM zsets WHERE key = ?1", params![dest])?;
            tx.execute("DELETE FROM deadlines WHERE key = ?1", params![dest])?;

            let mut combined: Option<HashMap<String, f64>> = None;
            for key in sources {
                let members = sorted_members(tx, key)?;
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

            if let Some(result) = combined {
                let mut insert = tx.prepare(
                    "INSERT INTO zsets(key, member, score) VALUES (?1, ?2, ?3)",
                )?;
                for (member, score) in result {
                    insert.execute(params![dest, member, score])?;
                }
            }
            Ok(())
        })
    }

    fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        self.with_conn(|conn| {
            let now = now_ms();
            purge_expired(conn, key, now)?;
            if key_exists(conn, key)? {
                let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
                conn.execute(
                    r"
                    INSERT INTO deadlines(key, expires_at_ms) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET expires_at_ms = excluded.expires_at_ms
                    ",
                    params![key, now.saturating_add(ttl_ms)],
                )?;
            }
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| drop_key(conn, key))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            purge_expired(conn, key, now_ms())?;
            key_exists(conn, key)
        })
    }

    fn run_batch(&self, batch: Batch) -> Result<()> {
        self.with_tx(|tx| {
            let now = now_ms();
            for op in &batch.ops {
                apply_op(tx, op, now)?;
            }
            Ok(())
        })
    }
}
