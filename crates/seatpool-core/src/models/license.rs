//! License records and the assignment state carried on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LicenseId, MemberId, OrgId};
use super::tier::Tier;

/// License status. Revocation is administrative and happens outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// One entry in a license's append-only release history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub member_id: MemberId,
    pub released_at: DateTime<Utc>,
    pub released_by: String,
}

/// A single seat in an organization's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub org_id: OrgId,
    pub tier: Tier,
    pub status: LicenseStatus,
    pub assigned_member_id: Option<MemberId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub release_history: Vec<ReleaseRecord>,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: u64,
}

impl License {
    pub fn is_active(&self) -> bool {
        self.status == LicenseStatus::Active
    }

    /// ACTIVE and assigned: counts against the quota.
    pub fn is_seat_in_use(&self) -> bool {
        self.is_active() && self.assigned_member_id.is_some()
    }

    /// ACTIVE and free to hand out.
    pub fn is_available(&self) -> bool {
        self.is_active() && self.assigned_member_id.is_none()
    }

    pub fn is_assigned_to(&self, member: MemberId) -> bool {
        self.assigned_member_id == Some(member)
    }

    /// Point the license at `member`.
    pub fn assign(&mut self, member: MemberId, at: DateTime<Utc>) {
        self.assigned_member_id = Some(member);
        self.assigned_at = Some(at);
    }

    /// Clear the assignment and append a history entry. Returns the member released.
    pub fn release(&mut self, at: DateTime<Utc>, released_by: &str) -> Option<MemberId> {
        let member = self.assigned_member_id.take()?;
        self.assigned_at = None;
        self.release_history.push(ReleaseRecord {
            member_id: member,
            released_at: at,
            released_by: released_by.to_string(),
        });
        Some(member)
    }
}

/// Filter for listing licenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LicenseFilter {
    #[default]
    All,
    Active,
    /// ACTIVE with an assigned member.
    Assigned,
    /// ACTIVE with no assigned member.
    Unassigned,
}

impl LicenseFilter {
    pub fn matches(&self, license: &License) -> bool {
        match self {
            Self::All => true,
            Self::Active => license.is_active(),
            Self::Assigned => license.is_seat_in_use(),
            Self::Unassigned => license.is_available(),
        }
    }
}
