//! `ISeatStore` — the narrow store contract the engine needs.
//!
//! Reads are snapshot reads. Writes go through `commit`, which applies a
//! whole `WriteBatch` atomically or not at all: every op is conditional on
//! the version the engine read, and the optional guard pins the number of
//! seats in use. Any mismatch is `StoreError::Conflict`.

use crate::errors::StoreResult;
use crate::models::{License, LicenseFilter, LicenseId, Member, MemberId, OrgId};

/// Read access to the license pool.
pub trait ILicensePool: Send + Sync {
    fn get_license(&self, org: &OrgId, id: LicenseId) -> StoreResult<Option<License>>;

    /// Licenses of one organization, ordered by id (oldest first).
    fn list_licenses(&self, org: &OrgId, filter: LicenseFilter) -> StoreResult<Vec<License>>;
}

/// Read access to the member directory.
pub trait IMemberDirectory: Send + Sync {
    fn get_member(&self, org: &OrgId, id: MemberId) -> StoreResult<Option<Member>>;

    /// Members of one organization, ordered by id (oldest first).
    fn list_members(&self, org: &OrgId) -> StoreResult<Vec<Member>>;
}

/// Pool + directory with multi-record conditional commit.
pub trait ISeatStore: ILicensePool + IMemberDirectory {
    fn commit(&self, batch: &WriteBatch) -> StoreResult<()>;

    /// Every license and member of `org` from one read snapshot.
    ///
    /// The default reads the two lists separately; adapters that can pin a
    /// snapshot override it.
    fn read_pool(&self, org: &OrgId) -> StoreResult<PoolView> {
        Ok(PoolView {
            licenses: self.list_licenses(org, LicenseFilter::All)?,
            members: self.list_members(org)?,
        })
    }
}

/// Licenses and members of one organization, both ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolView {
    pub licenses: Vec<License>,
    pub members: Vec<Member>,
}

/// One conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Persist the assignment fields and release history of `license`.
    UpdateLicense { license: License, expected_version: u64 },
    /// Persist `member.assigned_license_id`.
    UpdateMember { member: Member, expected_version: u64 },
    DeleteMember { id: MemberId, expected_version: u64 },
}

/// Precondition checked inside the commit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchGuard {
    /// Number of ACTIVE assigned licenses in the organization must still be this.
    SeatsInUse(u32),
}

/// Atomic set of writes scoped to one organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    pub org: OrgId,
    pub ops: Vec<WriteOp>,
    pub guards: Vec<BatchGuard>,
}

impl WriteBatch {
    pub fn new(org: OrgId) -> Self {
        Self {
            org,
            ops: Vec::new(),
            guards: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn update_license(&mut self, license: License, expected_version: u64) {
        self.ops.push(WriteOp::UpdateLicense {
            license,
            expected_version,
        });
    }

    pub fn update_member(&mut self, member: Member, expected_version: u64) {
        self.ops.push(WriteOp::UpdateMember {
            member,
            expected_version,
        });
    }

    pub fn delete_member(&mut self, id: MemberId, expected_version: u64) {
        self.ops.push(WriteOp::DeleteMember {
            id,
            expected_version,
        });
    }

    pub fn guard(&mut self, guard: BatchGuard) {
        self.guards.push(guard);
    }
}
