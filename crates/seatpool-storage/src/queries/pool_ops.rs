//! Whole-organization reads pinned to one snapshot.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use seatpool_core::errors::StoreResult;
use seatpool_core::models::{LicenseFilter, OrgId};
use seatpool_core::traits::PoolView;

use super::{license_ops, member_ops};
use crate::to_store_err;

/// Licenses and members inside one deferred read transaction. In WAL mode
/// the snapshot is fixed at the first SELECT, so a commit landing between
/// the two queries is not seen by either.
pub fn read_pool(conn: &Connection, org: &OrgId) -> StoreResult<PoolView> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)
        .map_err(to_store_err)?;
    let view = PoolView {
        licenses: license_ops::list_licenses(&tx, org, LicenseFilter::All)?,
        members: member_ops::list_members(&tx, org)?,
    };
    tx.commit().map_err(to_store_err)?;
    Ok(view)
}
