//! Store methods for the notable-event log.

use crate::{
    error::{SimError, SimResult},
    event::SimEvent,
};
use rusqlite::{params, Connection};

use super::SimStore;

impl SimStore {
    pub(super) fn insert_events(conn: &Connection, run: i64, events: &[SimEvent]) -> SimResult<()> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO event_log (run, day, event_type, payload) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for event in events {
            let payload = serde_json::to_string(event)?;
            stmt.execute(params![run, event.day() as i64, event.type_name(), payload])?;
        }
        Ok(())
    }

    /// Events of a run in the order they were emitted.
    pub fn events(&self, run: i64) -> SimResult<Vec<SimEvent>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM event_log WHERE run = ?1 ORDER BY id ASC")?;
        let payloads = stmt
            .query_map(params![run], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str::<SimEvent>(p).map_err(SimError::from))
            .collect()
    }

    pub fn event_count(&self, run: i64, event_type: &str) -> SimResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run = ?1 AND event_type = ?2",
            params![run, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
