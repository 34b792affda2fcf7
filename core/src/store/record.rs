//! Store methods for the per-day record table.

use crate::{error::SimResult, snapshot::SimulationRecord, types::Day};
use rusqlite::{params, Connection, OptionalExtension};

use super::SimStore;

/// One persisted day. Run-level fields (seed, scenario, policy) live on
/// the `run` row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub day:             Day,
    pub active:          u64,
    pub emission:        f64,
    pub burn:            f64,
    pub fee_revenue:     f64,
    pub price:           f64,
    pub circulating:     f64,
    pub treasury:        f64,
    pub burn_mint_ratio: f64,
    pub slashed_total:   u64,
    pub fraud_captured:  f64,
    pub fraud_captured_pct: f64,
}

const SELECT_RECORD: &str =
    "SELECT day, active, emission, burn, fee_revenue, price, circulating, treasury,
            burn_mint_ratio, slashed_total, fraud_captured, fraud_captured_pct
     FROM simulation_record";

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        day:                row.get::<_, i64>(0)? as Day,
        active:             row.get::<_, i64>(1)? as u64,
        emission:           row.get(2)?,
        burn:               row.get(3)?,
        fee_revenue:        row.get(4)?,
        price:              row.get(5)?,
        circulating:        row.get(6)?,
        treasury:           row.get(7)?,
        burn_mint_ratio:    row.get(8)?,
        slashed_total:      row.get::<_, i64>(9)? as u64,
        fraud_captured:     row.get(10)?,
        fraud_captured_pct: row.get(11)?,
    })
}

impl SimStore {
    pub(super) fn insert_records(conn: &Connection, run: i64, records: &[SimulationRecord]) -> SimResult<()> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO simulation_record (
                run, day, active, emission, burn, fee_revenue, price, circulating,
                treasury, burn_mint_ratio, slashed_total, fraud_captured, fraud_captured_pct)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for r in records {
            stmt.execute(params![
                run,
                r.day as i64,
                r.active as i64,
                r.emission,
                r.burn,
                r.fee_revenue,
                r.price,
                r.circulating,
                r.treasury,
                r.burn_mint_ratio,
                r.slashed_total as i64,
                r.fraud_captured,
                r.fraud_captured_pct,
            ])?;
        }
        Ok(())
    }

    pub fn records(&self, run: i64) -> SimResult<Vec<StoredRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_RECORD} WHERE run = ?1 ORDER BY day ASC"))?;
        let records = stmt
            .query_map(params![run], map_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn final_record(&self, run: i64) -> SimResult<Option<StoredRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("{SELECT_RECORD} WHERE run = ?1 ORDER BY day DESC LIMIT 1"),
                params![run],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn record_count(&self, run: i64) -> SimResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM simulation_record WHERE run = ?1",
            params![run],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
