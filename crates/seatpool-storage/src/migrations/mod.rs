//! Schema versioning with a dedicated single-row version table.
//!
//! Each version bump is a const SQL string applied inside one transaction.

mod v001_initial;

pub use v001_initial::{SCHEMA_V1, TABLE_NAMES};

use rusqlite::Connection;
use tracing::info;

use seatpool_core::errors::{StoreError, StoreResult};

use crate::to_store_err;

/// Current schema version. Bump this when adding new migrations.
pub const CURRENT_VERSION: u32 = 1;

/// Read the schema version. 0 means a fresh database.
pub fn get_schema_version(conn: &Connection) -> StoreResult<u32> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .map_err(to_store_err)?;
    if !exists {
        return Ok(0);
    }

    match conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get::<_, u32>(0)
    }) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(to_store_err(e)),
    }
}

fn set_schema_version(conn: &Connection, version: u32) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        ) STRICT;",
    )
    .map_err(to_store_err)?;
    conn.execute("DELETE FROM schema_version", [])
        .map_err(to_store_err)?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        rusqlite::params![version],
    )
    .map_err(to_store_err)?;
    Ok(())
}

fn apply(conn: &Connection, version: u32, sql: &str) -> StoreResult<()> {
    let tx = rusqlite::Transaction::new_unchecked(conn, rusqlite::TransactionBehavior::Immediate)
        .map_err(to_store_err)?;
    tx.execute_batch(sql).map_err(|e| StoreError::MigrationFailed {
        version,
        message: e.to_string(),
    })?;
    set_schema_version(&tx, version)?;
    tx.commit().map_err(to_store_err)
}

/// Run all pending migrations. Returns the version the database ends at.
pub fn migrate(conn: &Connection) -> StoreResult<u32> {
    let current = get_schema_version(conn)?;

    if current > CURRENT_VERSION {
        return Err(StoreError::MigrationFailed {
            version: current,
            message: format!(
                "database schema v{} is newer than this build (v{})",
                current, CURRENT_VERSION
            ),
        });
    }
    if current == CURRENT_VERSION {
        return Ok(current);
    }

    if current < 1 {
        info!("Migrating seatpool schema: 0 → 1 (initial tables)");
        apply(conn, 1, SCHEMA_V1)?;
    }

    let final_version = get_schema_version(conn)?;
    info!(from = current, to = final_version, "Seatpool schema migration complete");
    Ok(final_version)
}
