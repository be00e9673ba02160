//! License reads, conditional assignment writes, and admin writes.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use seatpool_core::errors::{StoreError, StoreResult};
use seatpool_core::models::{
    License, LicenseFilter, LicenseId, LicenseStatus, MemberId, OrgId, ReleaseRecord, Tier,
};

use crate::to_store_err;

const LICENSE_COLUMNS: &str =
    "id, org_id, tier, status, assigned_member_id, assigned_at, release_history, version";

/// Raw row; converted to `License` outside the rusqlite closure so bad data
/// surfaces as `Corrupt` rather than a generic SQLite error.
struct LicenseRow {
    id: i64,
    org_id: String,
    tier: String,
    status: String,
    assigned_member_id: Option<i64>,
    assigned_at: Option<i64>,
    release_history: String,
    version: i64,
}

impl LicenseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            tier: row.get(2)?,
            status: row.get(3)?,
            assigned_member_id: row.get(4)?,
            assigned_at: row.get(5)?,
            release_history: row.get(6)?,
            version: row.get(7)?,
        })
    }

    fn into_license(self) -> StoreResult<License> {
        let tier: Tier = self.tier.parse().map_err(|e| StoreError::Corrupt {
            details: format!("license {}: {}", self.id, e),
        })?;
        let status = LicenseStatus::parse(&self.status).ok_or_else(|| StoreError::Corrupt {
            details: format!("license {}: unknown status '{}'", self.id, self.status),
        })?;
        let assigned_at = match self.assigned_at {
            Some(ms) => Some(DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
                StoreError::Corrupt {
                    details: format!("license {}: bad assigned_at {}", self.id, ms),
                }
            })?),
            None => None,
        };
        let release_history: Vec<ReleaseRecord> = serde_json::from_str(&self.release_history)
            .map_err(|e| StoreError::Corrupt {
                details: format!("license {}: release_history: {}", self.id, e),
            })?;

        Ok(License {
            id: LicenseId(self.id),
            org_id: OrgId::new(self.org_id),
            tier,
            status,
            assigned_member_id: self.assigned_member_id.map(MemberId),
            assigned_at,
            release_history,
            version: self.version as u64,
        })
    }
}

pub fn get_license(conn: &Connection, org: &OrgId, id: LicenseId) -> StoreResult<Option<License>> {
    let sql = format!("SELECT {} FROM licenses WHERE id = ?1 AND org_id = ?2", LICENSE_COLUMNS);
    let row = conn
        .query_row(&sql, params![id.0, org.as_str()], LicenseRow::from_row)
        .optional()
        .map_err(to_store_err)?;
    row.map(LicenseRow::into_license).transpose()
}

pub fn list_licenses(
    conn: &Connection,
    org: &OrgId,
    filter: LicenseFilter,
) -> StoreResult<Vec<License>> {
    let predicate = match filter {
        LicenseFilter::All => "",
        LicenseFilter::Active => " AND status = 'active'",
        LicenseFilter::Assigned => " AND status = 'active' AND assigned_member_id IS NOT NULL",
        LicenseFilter::Unassigned => " AND status = 'active' AND assigned_member_id IS NULL",
    };
    let sql = format!(
        "SELECT {} FROM licenses WHERE org_id = ?1{} ORDER BY id ASC",
        LICENSE_COLUMNS, predicate
    );
    let mut stmt = conn.prepare(&sql).map_err(to_store_err)?;
    let rows = stmt
        .query_map(params![org.as_str()], LicenseRow::from_row)
        .map_err(to_store_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(to_store_err)?;
    rows.into_iter().map(LicenseRow::into_license).collect()
}

/// ACTIVE licenses with an assigned member.
pub fn count_seats_in_use(conn: &Connection, org: &OrgId) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM licenses
         WHERE org_id = ?1 AND status = 'active' AND assigned_member_id IS NOT NULL",
        params![org.as_str()],
        |row| row.get::<_, u32>(0),
    )
    .map_err(to_store_err)
}

/// Version-checked write of the assignment fields. Returns rows changed (0 = conflict).
pub fn update_assignment(
    conn: &Connection,
    org: &OrgId,
    license: &License,
    expected_version: u64,
) -> StoreResult<usize> {
    let history = serde_json::to_string(&license.release_history)?;
    conn.execute(
        "UPDATE licenses
         SET assigned_member_id = ?1, assigned_at = ?2, release_history = ?3, version = version + 1
         WHERE id = ?4 AND org_id = ?5 AND version = ?6",
        params![
            license.assigned_member_id.map(|m| m.0),
            license.assigned_at.map(|t| t.timestamp_millis()),
            history,
            license.id.0,
            org.as_str(),
            expected_version as i64,
        ],
    )
    .map_err(to_store_err)
}

pub fn insert_license(conn: &Connection, org: &OrgId, tier: Tier) -> StoreResult<LicenseId> {
    conn.execute(
        "INSERT INTO licenses (org_id, tier, status) VALUES (?1, ?2, 'active')",
        params![org.as_str(), tier.as_str()],
    )
    .map_err(to_store_err)?;
    Ok(LicenseId(conn.last_insert_rowid()))
}

pub fn revoke_license(conn: &Connection, org: &OrgId, id: LicenseId) -> StoreResult<()> {
    let changed = conn
        .execute(
            "UPDATE licenses SET status = 'revoked', version = version + 1
             WHERE id = ?1 AND org_id = ?2",
            params![id.0, org.as_str()],
        )
        .map_err(to_store_err)?;
    if changed == 0 {
        return Err(StoreError::not_found("license", id));
    }
    Ok(())
}

/// Unconditional upsert of every field. Bumps the version if the row existed.
pub fn force_put_license(conn: &Connection, license: &License) -> StoreResult<()> {
    let history = serde_json::to_string(&license.release_history)?;
    conn.execute(
        "INSERT INTO licenses
            (id, org_id, tier, status, assigned_member_id, assigned_at, release_history, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            org_id = excluded.org_id,
            tier = excluded.tier,
            status = excluded.status,
            assigned_member_id = excluded.assigned_member_id,
            assigned_at = excluded.assigned_at,
            release_history = excluded.release_history,
            version = licenses.version + 1",
        params![
            license.id.0,
            license.org_id.as_str(),
            license.tier.as_str(),
            license.status.as_str(),
            license.assigned_member_id.map(|m| m.0),
            license.assigned_at.map(|t| t.timestamp_millis()),
            history,
            license.version.max(1) as i64,
        ],
    )
    .map_err(to_store_err)?;
    Ok(())
}
