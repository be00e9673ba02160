//! SQLite PRAGMA configuration for store connections.
//! Must be called on every connection immediately after opening.

use std::time::Duration;

use rusqlite::Connection;

use seatpool_core::errors::StoreResult;

use crate::to_store_err;

/// Configure a read-write connection.
///
/// - WAL for concurrent readers during writes
/// - busy_timeout is the caller-supplied store timeout; contention past it surfaces as Unavailable
/// - foreign keys stay off: dangling references must be representable so they can be reconciled
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -8000;
        PRAGMA temp_store = MEMORY;
        ",
    )
    .map_err(to_store_err)?;
    conn.busy_timeout(busy_timeout).map_err(to_store_err)?;
    Ok(())
}

/// Configure a reader. The writer owns the journal mode; readers add `query_only`.
pub fn configure_readonly_connection(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.execute_batch(
        "
        PRAGMA cache_size = -8000;
        PRAGMA temp_store = MEMORY;
        PRAGMA query_only = ON;
        ",
    )
    .map_err(to_store_err)?;
    conn.busy_timeout(busy_timeout).map_err(to_store_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_busy_timeout() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn, Duration::from_millis(1234)).unwrap();
        let timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 1234);
    }

    #[test]
    fn journal_mode_wal_or_memory() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn, Duration::from_secs(1)).unwrap();
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        // In-memory databases report "memory".
        assert!(mode == "wal" || mode == "memory", "got {}", mode);
    }

    #[test]
    fn readonly_rejects_writes() {
        let conn = Connection::open_in_memory().unwrap();
        configure_readonly_connection(&conn, Duration::from_secs(1)).unwrap();
        assert!(conn.execute_batch("CREATE TABLE t (x INTEGER)").is_err());
    }
}
