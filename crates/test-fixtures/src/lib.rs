//! Shared helpers for seatpool integration tests.
//!
//! Seeding goes through `ISeatAdmin`, so every helper works against both
//! the in-memory and the SQLite adapter. `invariant_violations` checks
//! I1–I5 over a store snapshot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use seatpool_core::config::{PolicyConfig, SeatPoolConfig, TierPolicyEntry};
use seatpool_core::models::{
    LicenseFilter, LicenseId, MemberId, OrgId, Role, Tier,
};
use seatpool_core::policy::TierQuotaPolicy;
use seatpool_core::traits::{ISeatAdmin, ISeatStore};

/// Policy where `tier` has `seat_quota` seats and the given exempt roles.
pub fn policy_with_quota(tier: Tier, seat_quota: u32, exempt: &[&str]) -> TierQuotaPolicy {
    let config = PolicyConfig::default().with_tier(tier, TierPolicyEntry::new(seat_quota, exempt));
    match TierQuotaPolicy::from_config(&config) {
        Ok(policy) => policy,
        Err(e) => panic!("fixture policy rejected: {}", e),
    }
}

/// Config with a custom quota and near-zero backoff so retry tests stay fast.
pub fn fast_config(tier: Tier, seat_quota: u32, exempt: &[&str]) -> SeatPoolConfig {
    let mut config = SeatPoolConfig::default();
    config.policy = PolicyConfig::default().with_tier(tier, TierPolicyEntry::new(seat_quota, exempt));
    config.engine.backoff_base_ms = 0;
    config.engine.backoff_max_ms = 1;
    config
}

/// Register `org` at `tier`.
pub fn seed_org<S: ISeatAdmin + ?Sized>(store: &S, org: &str, tier: Tier) -> OrgId {
    let org = OrgId::new(org);
    store
        .upsert_organization(&org, tier)
        .unwrap_or_else(|e| panic!("seed org {}: {}", org, e));
    org
}

/// Issue `n` fresh licenses, oldest first.
pub fn issue_licenses<S: ISeatAdmin + ?Sized>(store: &S, org: &OrgId, tier: Tier, n: usize) -> Vec<LicenseId> {
    (0..n)
        .map(|_| {
            store
                .issue_license(org, tier)
                .unwrap_or_else(|e| panic!("issue license: {}", e))
        })
        .collect()
}

pub fn add_member<S: ISeatAdmin + ?Sized>(store: &S, org: &OrgId, email: &str, role: &str) -> MemberId {
    store
        .create_member(org, email, Role::new(role))
        .unwrap_or_else(|e| panic!("create member {}: {}", email, e))
}

/// `n` plain members named `member{i}@example.com`.
pub fn add_members<S: ISeatAdmin + ?Sized>(store: &S, org: &OrgId, n: usize) -> Vec<MemberId> {
    (0..n)
        .map(|i| add_member(store, org, &format!("member{}@example.com", i), "member"))
        .collect()
}

/// Write a license assignment verbatim, bypassing the engine (drift injection).
pub fn force_license_assignment<S>(
    store: &S,
    org: &OrgId,
    license: LicenseId,
    member: Option<MemberId>,
    at: Option<DateTime<Utc>>,
) where
    S: ISeatAdmin + ISeatStore + ?Sized,
{
    let mut record = store
        .get_license(org, license)
        .ok()
        .flatten()
        .unwrap_or_else(|| panic!("license {} missing", license));
    record.assigned_member_id = member;
    record.assigned_at = member.map(|_| at.unwrap_or_else(Utc::now));
    store
        .force_put_license(&record)
        .unwrap_or_else(|e| panic!("force put {}: {}", license, e));
}

/// Write a member back-reference verbatim, bypassing the engine.
pub fn force_member_reference<S>(store: &S, org: &OrgId, member: MemberId, license: Option<LicenseId>)
where
    S: ISeatAdmin + ISeatStore + ?Sized,
{
    let mut record = store
        .get_member(org, member)
        .ok()
        .flatten()
        .unwrap_or_else(|| panic!("member {} missing", member));
    record.assigned_license_id = license;
    store
        .force_put_member(&record)
        .unwrap_or_else(|e| panic!("force put {}: {}", member, e));
}

/// Both sides of an assignment, written verbatim.
pub fn force_assign<S>(store: &S, org: &OrgId, license: LicenseId, member: MemberId, at: DateTime<Utc>)
where
    S: ISeatAdmin + ISeatStore + ?Sized,
{
    force_license_assignment(store, org, license, Some(member), Some(at));
    force_member_reference(store, org, member, Some(license));
}

/// Every I1–I5 violation in `org`, as readable strings. Empty means consistent.
pub fn invariant_violations<S: ISeatStore + ?Sized>(
    store: &S,
    org: &OrgId,
    policy: &TierQuotaPolicy,
    tier: Tier,
) -> Vec<String> {
    let quota = match policy.quota_for(tier) {
        Ok(q) => q,
        Err(e) => return vec![e.to_string()],
    };
    let licenses = match store.list_licenses(org, LicenseFilter::All) {
        Ok(l) => l,
        Err(e) => return vec![format!("list licenses: {}", e)],
    };
    let members = match store.list_members(org) {
        Ok(m) => m,
        Err(e) => return vec![format!("list members: {}", e)],
    };

    let members_by_id: BTreeMap<_, _> = members.iter().map(|m| (m.id, m)).collect();
    let licenses_by_id: BTreeMap<_, _> = licenses.iter().map(|l| (l.id, l)).collect();
    let mut violations = Vec::new();

    let mut seats_per_member: BTreeMap<MemberId, BTreeSet<LicenseId>> = BTreeMap::new();
    for license in licenses.iter().filter(|l| l.is_active()) {
        let Some(member_id) = license.assigned_member_id else {
            continue;
        };
        seats_per_member.entry(member_id).or_default().insert(license.id);
        match members_by_id.get(&member_id) {
            None => violations.push(format!("I5: {} assigned to missing {}", license.id, member_id)),
            Some(member) => {
                if member.assigned_license_id != Some(license.id) {
                    violations.push(format!(
                        "I1: {} → {} but member points at {:?}",
                        license.id, member_id, member.assigned_license_id
                    ));
                }
                if quota.is_exempt(&member.role) {
                    violations.push(format!("I4: exempt {} holds {}", member_id, license.id));
                }
            }
        }
    }
    for license in licenses.iter().filter(|l| !l.is_active()) {
        if let Some(member_id) = license.assigned_member_id {
            violations.push(format!("revoked {} still assigned to {}", license.id, member_id));
        }
    }

    for (member_id, seats) in &seats_per_member {
        if seats.len() > 1 {
            violations.push(format!("I2: {} holds {:?}", member_id, seats));
        }
    }

    for member in &members {
        let Some(license_id) = member.assigned_license_id else {
            continue;
        };
        match licenses_by_id.get(&license_id) {
            None => violations.push(format!("I5: {} points at missing {}", member.id, license_id)),
            Some(license) => {
                if !license.is_active() || license.assigned_member_id != Some(member.id) {
                    violations.push(format!(
                        "I1: {} → {} but license points at {:?}",
                        member.id, license_id, license.assigned_member_id
                    ));
                }
            }
        }
    }

    let in_use = licenses.iter().filter(|l| l.is_seat_in_use()).count() as u32;
    if in_use > quota.seat_quota {
        violations.push(format!("I3: {} seats in use, quota {}", in_use, quota.seat_quota));
    }

    violations
}
