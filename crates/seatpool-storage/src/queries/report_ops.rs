//! reconcile_runs: one row per reconciliation report.

use rusqlite::{params, Connection};

use seatpool_core::errors::StoreResult;
use seatpool_core::models::{OrgId, ReconcileReport};

use crate::to_store_err;

pub fn insert_report(conn: &Connection, report: &ReconcileReport) -> StoreResult<()> {
    let json = serde_json::to_string(report)?;
    conn.execute(
        "INSERT INTO reconcile_runs (scan_id, org_id, incomplete, anomalies_found, anomalies_healed, report)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            report.scan_id,
            report.org_id.as_str(),
            report.incomplete,
            report.total_found(),
            report.total_healed(),
            json,
        ],
    )
    .map_err(to_store_err)?;
    Ok(())
}

pub fn recent_reports(conn: &Connection, org: &OrgId, limit: usize) -> StoreResult<Vec<ReconcileReport>> {
    let mut stmt = conn
        .prepare("SELECT report FROM reconcile_runs WHERE org_id = ?1 ORDER BY id DESC LIMIT ?2")
        .map_err(to_store_err)?;
    let raw = stmt
        .query_map(params![org.as_str(), limit as i64], |row| row.get::<_, String>(0))
        .map_err(to_store_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(to_store_err)?;
    let mut reports = Vec::with_capacity(raw.len());
    for json in raw {
        reports.push(serde_json::from_str(&json)?);
    }
    Ok(reports)
}
