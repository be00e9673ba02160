//! Organization → tier table.

use rusqlite::{params, Connection, OptionalExtension};

use seatpool_core::errors::StoreResult;
use seatpool_core::models::{OrgId, Tier};

use crate::to_store_err;

pub fn upsert_organization(conn: &Connection, org: &OrgId, tier: Tier) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO organizations (org_id, tier) VALUES (?1, ?2)
         ON CONFLICT(org_id) DO UPDATE SET tier = excluded.tier, updated_at = unixepoch()",
        params![org.as_str(), tier.as_str()],
    )
    .map_err(to_store_err)?;
    Ok(())
}

/// Raw tier name; parsing is the policy's job.
pub fn get_tier(conn: &Connection, org: &OrgId) -> StoreResult<Option<String>> {
    conn.query_row(
        "SELECT tier FROM organizations WHERE org_id = ?1",
        params![org.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(to_store_err)
}
