//! Reconciliation report: what a scan found, healed, and flagged.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LicenseId, MemberId, OrgId};

/// Classes of drift the scanner detects, in the order it processes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// REVOKED license still carries an assignment.
    RevokedLicenseAssigned,
    /// License assigned to a member that is not in the organization (I5).
    DanglingLicenseAssignment,
    /// Several member records share one normalized email.
    DuplicateMember,
    /// Member holds more than one ACTIVE license (I2).
    MemberMultipleLicenses,
    /// Member back-reference names a license that does not exist (I5).
    DanglingMemberReference,
    /// Member back-reference disagrees with the license side (I1).
    BackReferenceMismatch,
    /// Exempt-role member holds a seat (I4).
    ExemptRoleAssigned,
    /// More seats in use than the tier allows (I3).
    QuotaExceeded,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 8] = [
        Self::RevokedLicenseAssigned,
        Self::DanglingLicenseAssignment,
        Self::DuplicateMember,
        Self::MemberMultipleLicenses,
        Self::DanglingMemberReference,
        Self::BackReferenceMismatch,
        Self::ExemptRoleAssigned,
        Self::QuotaExceeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RevokedLicenseAssigned => "revoked_license_assigned",
            Self::DanglingLicenseAssignment => "dangling_license_assignment",
            Self::DuplicateMember => "duplicate_member",
            Self::MemberMultipleLicenses => "member_multiple_licenses",
            Self::DanglingMemberReference => "dangling_member_reference",
            Self::BackReferenceMismatch => "back_reference_mismatch",
            Self::ExemptRoleAssigned => "exempt_role_assigned",
            Self::QuotaExceeded => "quota_exceeded",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyTally {
    pub found: u32,
    pub healed: u32,
    /// Heals aborted because the precondition no longer held at commit time.
    pub stale: u32,
    pub failed: u32,
}

/// Items that need an operator decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlaggedItem {
    /// Pool was over quota; healed, but points at a billing/tier mismatch upstream.
    QuotaExceeded {
        assigned: u32,
        seat_quota: u32,
        released: Vec<LicenseId>,
    },
    /// Not enough unassigned licenses for the members without a seat.
    /// Creating licenses is outside the engine's authority.
    PoolShortage {
        awaiting: u32,
        unassigned: u32,
        members: Vec<MemberId>,
    },
}

/// A heal that errored (as opposed to going stale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealFailure {
    pub kind: AnomalyKind,
    pub subject: String,
    pub error: String,
}

/// Result of one reconciliation pass over one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub scan_id: String,
    pub org_id: OrgId,
    pub seat_quota: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub anomalies: BTreeMap<AnomalyKind, AnomalyTally>,
    pub flagged: Vec<FlaggedItem>,
    pub heal_failures: Vec<HealFailure>,
    /// Scan was cut short (cancelled or store went away).
    pub incomplete: bool,
}

impl ReconcileReport {
    pub fn new(scan_id: impl Into<String>, org_id: OrgId, started_at: DateTime<Utc>) -> Self {
        Self {
            scan_id: scan_id.into(),
            org_id,
            seat_quota: 0,
            started_at,
            finished_at: None,
            anomalies: BTreeMap::new(),
            flagged: Vec::new(),
            heal_failures: Vec::new(),
            incomplete: false,
        }
    }

    pub fn tally(&self, kind: AnomalyKind) -> AnomalyTally {
        self.anomalies.get(&kind).copied().unwrap_or_default()
    }

    fn tally_mut(&mut self, kind: AnomalyKind) -> &mut AnomalyTally {
        self.anomalies.entry(kind).or_default()
    }

    pub fn record_found(&mut self, kind: AnomalyKind) {
        self.tally_mut(kind).found += 1;
    }

    pub fn record_healed(&mut self, kind: AnomalyKind) {
        self.tally_mut(kind).healed += 1;
    }

    pub fn record_stale(&mut self, kind: AnomalyKind) {
        self.tally_mut(kind).stale += 1;
    }

    pub fn record_failure(&mut self, kind: AnomalyKind, subject: impl Into<String>, error: impl fmt::Display) {
        self.tally_mut(kind).failed += 1;
        self.heal_failures.push(HealFailure {
            kind,
            subject: subject.into(),
            error: error.to_string(),
        });
    }

    pub fn flag(&mut self, item: FlaggedItem) {
        self.flagged.push(item);
    }

    pub fn found(&self, kind: AnomalyKind) -> u32 {
        self.tally(kind).found
    }

    pub fn healed(&self, kind: AnomalyKind) -> u32 {
        self.tally(kind).healed
    }

    pub fn total_found(&self) -> u32 {
        self.anomalies.values().map(|t| t.found).sum()
    }

    pub fn total_healed(&self) -> u32 {
        self.anomalies.values().map(|t| t.healed).sum()
    }

    /// No drift found and nothing failed. A standing `PoolShortage` flag is
    /// current state, not drift, so it does not count.
    pub fn is_empty(&self) -> bool {
        self.total_found() == 0 && self.heal_failures.is_empty()
    }

    pub fn has_pool_shortage(&self) -> bool {
        self.flagged
            .iter()
            .any(|f| matches!(f, FlaggedItem::PoolShortage { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ReconcileReport {
        ReconcileReport::new("scan-1", OrgId::new("acme"), Utc::now())
    }

    #[test]
    fn fresh_report_is_empty() {
        let r = report();
        assert!(r.is_empty());
        assert_eq!(r.total_found(), 0);
        assert_eq!(r.found(AnomalyKind::QuotaExceeded), 0);
    }

    #[test]
    fn tallies_accumulate() {
        let mut r = report();
        r.record_found(AnomalyKind::DuplicateMember);
        r.record_found(AnomalyKind::DuplicateMember);
        r.record_healed(AnomalyKind::DuplicateMember);
        r.record_stale(AnomalyKind::DuplicateMember);
        let t = r.tally(AnomalyKind::DuplicateMember);
        assert_eq!((t.found, t.healed, t.stale, t.failed), (2, 1, 1, 0));
        assert!(!r.is_empty());
    }

    #[test]
    fn shortage_flag_alone_keeps_report_empty() {
        let mut r = report();
        r.flag(FlaggedItem::PoolShortage {
            awaiting: 3,
            unassigned: 1,
            members: vec![MemberId(1), MemberId(2), MemberId(3)],
        });
        assert!(r.is_empty());
        assert!(r.has_pool_shortage());
    }

    #[test]
    fn failure_makes_report_non_empty() {
        let mut r = report();
        r.record_failure(AnomalyKind::ExemptRoleAssigned, "mem-1", "boom");
        assert!(!r.is_empty());
        assert_eq!(r.heal_failures[0].error, "boom");
    }

    #[test]
    fn report_serializes_with_snake_case_kinds() {
        let mut r = report();
        r.record_found(AnomalyKind::MemberMultipleLicenses);
        r.flag(FlaggedItem::QuotaExceeded {
            assigned: 3,
            seat_quota: 2,
            released: vec![LicenseId(3)],
        });
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("member_multiple_licenses"));
        assert!(json.contains("\"kind\":\"quota_exceeded\""));
        let back: ReconcileReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
