//! Member reads, conditional back-reference writes, deletes, and admin writes.

use rusqlite::{params, Connection, OptionalExtension, Row};

use seatpool_core::errors::{StoreError, StoreResult};
use seatpool_core::models::{LicenseId, Member, MemberId, OrgId, Role};

use crate::to_store_err;

const MEMBER_COLUMNS: &str = "id, org_id, email, role, assigned_license_id, version";

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: MemberId(row.get(0)?),
        org_id: OrgId::new(row.get::<_, String>(1)?),
        email: row.get(2)?,
        role: Role::new(row.get::<_, String>(3)?),
        assigned_license_id: row.get::<_, Option<i64>>(4)?.map(LicenseId),
        version: row.get::<_, i64>(5)? as u64,
    })
}

pub fn get_member(conn: &Connection, org: &OrgId, id: MemberId) -> StoreResult<Option<Member>> {
    let sql = format!("SELECT {} FROM members WHERE id = ?1 AND org_id = ?2", MEMBER_COLUMNS);
    conn.query_row(&sql, params![id.0, org.as_str()], member_from_row)
        .optional()
        .map_err(to_store_err)
}

pub fn list_members(conn: &Connection, org: &OrgId) -> StoreResult<Vec<Member>> {
    let sql = format!(
        "SELECT {} FROM members WHERE org_id = ?1 ORDER BY id ASC",
        MEMBER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql).map_err(to_store_err)?;
    let rows = stmt
        .query_map(params![org.as_str()], member_from_row)
        .map_err(to_store_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(to_store_err)?;
    Ok(rows)
}

/// Version-checked write of the back-reference. Returns rows changed (0 = conflict).
pub fn update_back_reference(
    conn: &Connection,
    org: &OrgId,
    member: &Member,
    expected_version: u64,
) -> StoreResult<usize> {
    conn.execute(
        "UPDATE members SET assigned_license_id = ?1, version = version + 1
         WHERE id = ?2 AND org_id = ?3 AND version = ?4",
        params![
            member.assigned_license_id.map(|l| l.0),
            member.id.0,
            org.as_str(),
            expected_version as i64,
        ],
    )
    .map_err(to_store_err)
}

/// Version-checked delete. Returns rows changed (0 = conflict).
pub fn delete_member(
    conn: &Connection,
    org: &OrgId,
    id: MemberId,
    expected_version: u64,
) -> StoreResult<usize> {
    conn.execute(
        "DELETE FROM members WHERE id = ?1 AND org_id = ?2 AND version = ?3",
        params![id.0, org.as_str(), expected_version as i64],
    )
    .map_err(to_store_err)
}

pub fn insert_member(conn: &Connection, org: &OrgId, email: &str, role: &Role) -> StoreResult<MemberId> {
    conn.execute(
        "INSERT INTO members (org_id, email, role) VALUES (?1, ?2, ?3)",
        params![org.as_str(), email, role.as_str()],
    )
    .map_err(to_store_err)?;
    Ok(MemberId(conn.last_insert_rowid()))
}

/// Unconditional upsert of every field.
pub fn force_put_member(conn: &Connection, member: &Member) -> StoreResult<()> {
    if member.email.trim().is_empty() {
        return Err(StoreError::Corrupt {
            details: format!("member {} has an empty email", member.id),
        });
    }
    conn.execute(
        "INSERT INTO members (id, org_id, email, role, assigned_license_id, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            org_id = excluded.org_id,
            email = excluded.email,
            role = excluded.role,
            assigned_license_id = excluded.assigned_license_id,
            version = members.version + 1",
        params![
            member.id.0,
            member.org_id.as_str(),
            member.email,
            member.role.as_str(),
            member.assigned_license_id.map(|l| l.0),
            member.version.max(1) as i64,
        ],
    )
    .map_err(to_store_err)?;
    Ok(())
}
