//! # seatpool-storage
//!
//! Store adapters implementing the `seatpool-core` store traits.
//! `SqliteSeatStore`: single write connection + read pool (WAL mode),
//! schema migrations, version-checked batch commits.
//! `InMemorySeatStore`: same contract in a mutex, with fault injection for tests.

pub mod engine;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod pragmas;
pub mod queries;

pub use engine::SqliteSeatStore;
pub use memory::{InMemorySeatStore, MemoryTables};

use seatpool_core::errors::StoreError;

/// Convert a rusqlite error. Lock contention that outlived `busy_timeout`
/// is a timeout, reported as `Unavailable`.
pub fn to_store_err(e: rusqlite::Error) -> StoreError {
    if is_busy_error(&e) {
        StoreError::Unavailable {
            reason: e.to_string(),
        }
    } else {
        StoreError::Sqlite {
            message: e.to_string(),
        }
    }
}

/// Check if a rusqlite error is SQLITE_BUSY or SQLITE_LOCKED.
fn is_busy_error(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::DatabaseBusy | rusqlite::ffi::ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_unavailable() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::DatabaseBusy,
                extended_code: 5,
            },
            None,
        );
        assert!(matches!(to_store_err(err), StoreError::Unavailable { .. }));
    }

    #[test]
    fn other_errors_map_to_sqlite() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(to_store_err(err), StoreError::Sqlite { .. }));
    }
}
