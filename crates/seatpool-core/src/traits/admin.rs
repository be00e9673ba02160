//! Administrative writes that happen outside the engine.
//!
//! Issuing and revoking licenses and creating members belong to billing and
//! onboarding; the engine never calls these. They exist so the adapters can
//! be seeded, and `force_put_*` lets importers (and tests) write records
//! verbatim, drift included.

use crate::errors::StoreResult;
use crate::models::{License, LicenseId, Member, MemberId, OrgId, Role, Tier};

pub trait ISeatAdmin: Send + Sync {
    /// Register an organization and its current tier.
    fn upsert_organization(&self, org: &OrgId, tier: Tier) -> StoreResult<()>;

    /// Issue a new ACTIVE, unassigned license.
    fn issue_license(&self, org: &OrgId, tier: Tier) -> StoreResult<LicenseId>;

    /// Mark a license REVOKED. Leaves any assignment for the engine to clear.
    fn revoke_license(&self, org: &OrgId, id: LicenseId) -> StoreResult<()>;

    fn create_member(&self, org: &OrgId, email: &str, role: Role) -> StoreResult<MemberId>;

    /// Overwrite a license record without a version check.
    fn force_put_license(&self, license: &License) -> StoreResult<()>;

    /// Overwrite a member record without a version check.
    fn force_put_member(&self, member: &Member) -> StoreResult<()>;
}
