//! Atomic, version-checked application of a `WriteBatch`.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use seatpool_core::errors::{StoreError, StoreResult};
use seatpool_core::traits::{BatchGuard, WriteBatch, WriteOp};

use super::{license_ops, member_ops};
use crate::to_store_err;

/// Apply every op or none. `BEGIN IMMEDIATE` takes the write lock up front so
/// guard checks and writes see the same state; any mismatch rolls back.
pub fn apply_batch(conn: &Connection, batch: &WriteBatch) -> StoreResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(to_store_err)?;

    for guard in &batch.guards {
        match guard {
            BatchGuard::SeatsInUse(expected) => {
                let actual = license_ops::count_seats_in_use(&tx, &batch.org)?;
                if actual != *expected {
                    debug!(org = %batch.org, expected, actual, "Seat count guard failed");
                    return Err(StoreError::conflict("pool", &batch.org));
                }
            }
        }
    }

    for op in &batch.ops {
        match op {
            WriteOp::UpdateLicense {
                license,
                expected_version,
            } => {
                if license_ops::update_assignment(&tx, &batch.org, license, *expected_version)? == 0 {
                    return Err(StoreError::conflict("license", license.id));
                }
            }
            WriteOp::UpdateMember {
                member,
                expected_version,
            } => {
                if member_ops::update_back_reference(&tx, &batch.org, member, *expected_version)? == 0 {
                    return Err(StoreError::conflict("member", member.id));
                }
            }
            WriteOp::DeleteMember {
                id,
                expected_version,
            } => {
                if member_ops::delete_member(&tx, &batch.org, *id, *expected_version)? == 0 {
                    return Err(StoreError::conflict("member", id));
                }
            }
        }
    }

    tx.commit().map_err(to_store_err)
}
