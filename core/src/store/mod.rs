//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database. The engine never touches
//! it; a finished `RunOutput` is handed to `save_run` as a whole.
//!
//! Layout: one `run` row per saved run (keyed by an autoincrement id,
//! since the same `<scenario>_<policy>` run id recurs across seeds and
//! overrides), its day records, and its notable events as JSON payloads.

mod event;
mod record;

use crate::{engine::RunOutput, error::SimResult, types::Day};
use rusqlite::{params, Connection, OptionalExtension};

pub use record::StoredRecord;

pub struct SimStore {
    conn: Connection,
}

/// Metadata row of a saved run.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRun {
    pub id:       i64,
    pub run_id:   String,
    pub seed:     u64,
    pub scenario: String,
    pub policy:   String,
    pub days:     Day,
    pub version:  String,
    pub saved_at: String,
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    /// Persist a finished run in one transaction. Returns the new run key.
    pub fn save_run(&self, output: &RunOutput) -> SimResult<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO run (run_id, seed, scenario, policy, days, version, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                output.run_id,
                output.seed as i64,
                output.scenario,
                output.policy.name(),
                output.records.len() as i64,
                env!("CARGO_PKG_VERSION"),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        let key = tx.last_insert_rowid();
        Self::insert_records(&tx, key, &output.records)?;
        Self::insert_events(&tx, key, &output.events)?;
        tx.commit()?;
        log::debug!(
            "saved run {} seed={} as #{key} ({} records, {} events)",
            output.run_id,
            output.seed,
            output.records.len(),
            output.events.len()
        );
        Ok(key)
    }

    pub fn run(&self, key: i64) -> SimResult<Option<StoredRun>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, run_id, seed, scenario, policy, days, version, saved_at
                 FROM run WHERE id = ?1",
                params![key],
                |row| {
                    Ok(StoredRun {
                        id:       row.get(0)?,
                        run_id:   row.get(1)?,
                        seed:     row.get::<_, i64>(2)? as u64,
                        scenario: row.get(3)?,
                        policy:   row.get(4)?,
                        days:     row.get::<_, i64>(5)? as Day,
                        version:  row.get(6)?,
                        saved_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// Keys of every saved run with this run id and seed, oldest first.
    pub fn find_runs(&self, run_id: &str, seed: u64) -> SimResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM run WHERE run_id = ?1 AND seed = ?2 ORDER BY id ASC")?;
        let keys = stmt
            .query_map(params![run_id, seed as i64], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(keys)
    }

    pub fn run_count(&self) -> SimResult<i64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM run", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let store = SimStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.migrate().unwrap();
        assert_eq!(store.run_count().unwrap(), 0);
        assert_eq!(store.run(1).unwrap(), None);
    }
}
