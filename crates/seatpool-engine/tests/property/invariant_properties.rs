//! Property-based tests for the allocation invariants.
//!
//! 1. Any sequence of Assign / Release / Transfer / removal keeps I1–I5.
//! 2. Any injected drift is healed by one reconcile pass, and a second
//!    pass finds nothing.

use std::sync::Arc;

use chrono::{Duration, Utc};
use proptest::prelude::*;

use seatpool_core::errors::AllocError;
use seatpool_core::models::{LicenseId, MemberId, OrgId, Tier};
use seatpool_core::traits::{IMemberDirectory, ISeatAdmin};
use seatpool_engine::{AllocationEngine, ReconciliationScanner};
use seatpool_storage::InMemorySeatStore;
use test_fixtures::{
    add_member, fast_config, force_license_assignment, force_member_reference,
    invariant_violations, issue_licenses, policy_with_quota, seed_org,
};

const QUOTA: u32 = 3;
const LICENSES: usize = 4;
const MEMBERS: usize = 6;

// =============================================================================
// Strategy helpers
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Assign(usize),
    Release(usize),
    Transfer(usize, usize),
    Removed(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..MEMBERS).prop_map(Op::Assign),
        2 => (0..MEMBERS).prop_map(Op::Release),
        2 => (0..MEMBERS, 0..MEMBERS).prop_map(|(a, b)| Op::Transfer(a, b)),
        1 => (0..MEMBERS).prop_map(Op::Removed),
    ]
}

#[derive(Debug, Clone)]
enum Drift {
    LicenseTo(usize, usize, i64),
    LicenseToGhost(usize),
    MemberTo(usize, usize),
    MemberToGhost(usize),
    Revoke(usize),
    Duplicate(usize),
}

fn drift_strategy() -> impl Strategy<Value = Drift> {
    prop_oneof![
        3 => (0..LICENSES, 0..MEMBERS, 0i64..600).prop_map(|(l, m, t)| Drift::LicenseTo(l, m, t)),
        1 => (0..LICENSES).prop_map(Drift::LicenseToGhost),
        2 => (0..MEMBERS, 0..LICENSES).prop_map(|(m, l)| Drift::MemberTo(m, l)),
        1 => (0..MEMBERS).prop_map(Drift::MemberToGhost),
        1 => (0..LICENSES).prop_map(Drift::Revoke),
        1 => (0..MEMBERS).prop_map(Drift::Duplicate),
    ]
}

struct World {
    store: Arc<InMemorySeatStore>,
    engine: Arc<AllocationEngine>,
    org: OrgId,
    licenses: Vec<LicenseId>,
    members: Vec<MemberId>,
}

/// Member 0 has the exempt role; the rest are plain members.
fn world() -> World {
    let store = Arc::new(InMemorySeatStore::new());
    let org = seed_org(store.as_ref(), "acme", Tier::Basic);
    let licenses = issue_licenses(store.as_ref(), &org, Tier::Basic, LICENSES);
    let members = (0..MEMBERS)
        .map(|i| {
            let role = if i == 0 { "billing" } else { "member" };
            add_member(store.as_ref(), &org, &format!("user{}@example.com", i), role)
        })
        .collect();
    let config = fast_config(Tier::Basic, QUOTA, &["billing"]);
    let engine = Arc::new(AllocationEngine::from_config(store.clone(), store.clone(), &config).unwrap());
    World {
        store,
        engine,
        org,
        licenses,
        members,
    }
}

impl World {
    fn violations(&self) -> Vec<String> {
        let policy = policy_with_quota(Tier::Basic, QUOTA, &["billing"]);
        invariant_violations(self.store.as_ref(), &self.org, &policy, Tier::Basic)
    }

    fn apply_drift(&self, drift: &Drift) {
        let store = self.store.as_ref();
        match *drift {
            Drift::LicenseTo(l, m, minutes) => {
                let at = Utc::now() - Duration::minutes(minutes);
                force_license_assignment(store, &self.org, self.licenses[l], Some(self.members[m]), Some(at));
            }
            Drift::LicenseToGhost(l) => {
                force_license_assignment(store, &self.org, self.licenses[l], Some(MemberId(10_000)), None);
            }
            Drift::MemberTo(m, l) => {
                if store.get_member(&self.org, self.members[m]).unwrap().is_some() {
                    force_member_reference(store, &self.org, self.members[m], Some(self.licenses[l]));
                }
            }
            Drift::MemberToGhost(m) => {
                if store.get_member(&self.org, self.members[m]).unwrap().is_some() {
                    force_member_reference(store, &self.org, self.members[m], Some(LicenseId(10_000)));
                }
            }
            Drift::Revoke(l) => {
                store.revoke_license(&self.org, self.licenses[l]).unwrap();
            }
            Drift::Duplicate(m) => {
                let email = format!("USER{}@example.com", m);
                add_member(store, &self.org, &email, "member");
            }
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn engine_operations_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let w = world();
        for op in &ops {
            let result = match *op {
                Op::Assign(m) => w.engine.assign_seat(&w.org, w.members[m]).map(|_| ()),
                Op::Release(m) => w.engine.release_seat(&w.org, w.members[m]).map(|_| ()),
                Op::Transfer(a, b) => w.engine.transfer(&w.org, w.members[a], w.members[b]).map(|_| ()),
                Op::Removed(m) => w.engine.on_member_removed(&w.org, w.members[m]).map(|_| ()),
            };
            if let Err(e) = result {
                prop_assert!(
                    matches!(e, AllocError::QuotaExhausted { .. } | AllocError::MemberExempt { .. }),
                    "unexpected error {:?} for {:?}", e, op
                );
            }
            let violations = w.violations();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);
        }
    }

    #[test]
    fn assign_then_release_restores_assignment_fields(m in 1..MEMBERS) {
        let w = world();
        let member = w.members[m];
        let license = w.engine.assign_seat(&w.org, member).unwrap();
        prop_assert_eq!(w.engine.release_seat(&w.org, member).unwrap(), Some(license));
        prop_assert_eq!(w.engine.release_seat(&w.org, member).unwrap(), None);
        prop_assert!(w.violations().is_empty());
    }

    #[test]
    fn reconcile_heals_any_drift(
        setup in prop::collection::vec(1..MEMBERS, 0..4),
        drift in prop::collection::vec(drift_strategy(), 1..12),
    ) {
        let w = world();
        for m in setup {
            let _ = w.engine.assign_seat(&w.org, w.members[m]);
        }
        for d in &drift {
            w.apply_drift(d);
        }

        let config = fast_config(Tier::Basic, QUOTA, &["billing"]);
        let scanner = ReconciliationScanner::new(Arc::clone(&w.engine), config.reconcile);
        let first = scanner.reconcile(&w.org).unwrap();
        prop_assert!(!first.incomplete);
        prop_assert!(first.heal_failures.is_empty(), "failures: {:?}", first.heal_failures);

        let violations = w.violations();
        prop_assert!(violations.is_empty(), "after reconcile: {:?}", violations);

        let second = scanner.reconcile(&w.org).unwrap();
        prop_assert!(second.is_empty(), "second pass: {:?}", second.anomalies);
    }
}
