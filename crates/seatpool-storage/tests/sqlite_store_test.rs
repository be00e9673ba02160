//! SQLite adapter: migrations, pragmas, reads, version-checked commits, admin writes.

use std::time::Duration;

use chrono::{TimeZone, Utc};

use seatpool_core::config::SeatPoolConfig;
use seatpool_core::errors::StoreError;
use seatpool_core::models::{
    AnomalyKind, LicenseFilter, LicenseId, LicenseStatus, MemberId, OrgId, ReconcileReport,
    ReleaseRecord, Role, Tier,
};
use seatpool_core::traits::{
    BatchGuard, ILicensePool, IMemberDirectory, IReconcileLog, ISeatAdmin, ISeatStore,
    ITierSource, WriteBatch,
};
use seatpool_storage::migrations::CURRENT_VERSION;
use seatpool_storage::SqliteSeatStore;

fn seeded() -> (SqliteSeatStore, OrgId, Vec<LicenseId>, MemberId) {
    let store = SqliteSeatStore::open_in_memory().unwrap();
    let org = OrgId::new("acme");
    store.upsert_organization(&org, Tier::Pro).unwrap();
    let licenses = (0..3)
        .map(|_| store.issue_license(&org, Tier::Pro).unwrap())
        .collect();
    let member = store
        .create_member(&org, "ada@example.com", Role::new("member"))
        .unwrap();
    (store, org, licenses, member)
}

fn assign_batch(store: &SqliteSeatStore, org: &OrgId, license: LicenseId, member: MemberId) -> WriteBatch {
    let mut l = store.get_license(org, license).unwrap().unwrap();
    let mut m = store.get_member(org, member).unwrap().unwrap();
    let (lv, mv) = (l.version, m.version);
    l.assign(member, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    m.assigned_license_id = Some(license);
    let mut batch = WriteBatch::new(org.clone());
    batch.update_license(l, lv);
    batch.update_member(m, mv);
    batch
}

#[test]
fn file_store_migrates_and_uses_wal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seatpool.db");
    let store = SqliteSeatStore::open(&path, 2, Duration::from_secs(1)).unwrap();
    assert_eq!(store.schema_version().unwrap(), CURRENT_VERSION);
    assert!(store.is_wal_mode());
    drop(store);

    // Reopen: migration is a no-op and data survives.
    let store = SqliteSeatStore::open(&path, 2, Duration::from_secs(1)).unwrap();
    let org = OrgId::new("acme");
    store.upsert_organization(&org, Tier::Basic).unwrap();
    store.issue_license(&org, Tier::Basic).unwrap();
    drop(store);
    let store = SqliteSeatStore::open(&path, 1, Duration::from_secs(1)).unwrap();
    assert_eq!(store.list_licenses(&org, LicenseFilter::All).unwrap().len(), 1);
}

#[test]
fn from_config_opens_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SeatPoolConfig::default();
    config.storage.db_path = Some(dir.path().join("cfg.db").to_string_lossy().into_owned());
    let store = SqliteSeatStore::from_config(&config).unwrap();
    assert_eq!(store.schema_version().unwrap(), CURRENT_VERSION);

    let in_memory = SqliteSeatStore::from_config(&SeatPoolConfig::default()).unwrap();
    assert_eq!(in_memory.schema_version().unwrap(), CURRENT_VERSION);
}

#[test]
fn tier_lookup_returns_raw_name() {
    let (store, org, _, _) = seeded();
    assert_eq!(store.tier_for(&org).unwrap().as_deref(), Some("pro"));
    assert_eq!(store.tier_for(&OrgId::new("ghost")).unwrap(), None);
    store.upsert_organization(&org, Tier::Enterprise).unwrap();
    assert_eq!(store.tier_for(&org).unwrap().as_deref(), Some("enterprise"));
}

#[test]
fn licenses_list_in_id_order_with_filters() {
    let (store, org, licenses, member) = seeded();
    store.commit(&assign_batch(&store, &org, licenses[1], member)).unwrap();
    store.revoke_license(&org, licenses[2]).unwrap();

    let all = store.list_licenses(&org, LicenseFilter::All).unwrap();
    assert_eq!(all.iter().map(|l| l.id).collect::<Vec<_>>(), licenses);
    assert_eq!(all[2].status, LicenseStatus::Revoked);

    let assigned = store.list_licenses(&org, LicenseFilter::Assigned).unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].id, licenses[1]);

    let free = store.list_licenses(&org, LicenseFilter::Unassigned).unwrap();
    assert_eq!(free.iter().map(|l| l.id).collect::<Vec<_>>(), vec![licenses[0]]);
    assert_eq!(store.list_licenses(&org, LicenseFilter::Active).unwrap().len(), 2);
    assert!(store.list_licenses(&OrgId::new("other"), LicenseFilter::All).unwrap().is_empty());
}

#[test]
fn commit_writes_both_sides_and_bumps_versions() {
    let (store, org, licenses, member) = seeded();
    store.commit(&assign_batch(&store, &org, licenses[0], member)).unwrap();

    let license = store.get_license(&org, licenses[0]).unwrap().unwrap();
    let m = store.get_member(&org, member).unwrap().unwrap();
    assert_eq!(license.assigned_member_id, Some(member));
    assert_eq!(
        license.assigned_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    );
    assert_eq!(license.version, 2);
    assert_eq!(m.assigned_license_id, Some(licenses[0]));
    assert_eq!(m.version, 2);
}

#[test]
fn release_history_round_trips_through_json_column() {
    let (store, org, licenses, member) = seeded();
    store.commit(&assign_batch(&store, &org, licenses[0], member)).unwrap();

    let mut license = store.get_license(&org, licenses[0]).unwrap().unwrap();
    let version = license.version;
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
    license.release(at, "allocation-engine");
    let mut batch = WriteBatch::new(org.clone());
    batch.update_license(license, version);
    store.commit(&batch).unwrap();

    let stored = store.get_license(&org, licenses[0]).unwrap().unwrap();
    assert_eq!(stored.assigned_member_id, None);
    assert_eq!(
        stored.release_history,
        vec![ReleaseRecord {
            member_id: member,
            released_at: at,
            released_by: "allocation-engine".into(),
        }]
    );
}

#[test]
fn stale_version_rolls_back_entire_batch() {
    let (store, org, licenses, member) = seeded();
    let batch = assign_batch(&store, &org, licenses[0], member);

    // Someone else bumps the member first.
    let mut m = store.get_member(&org, member).unwrap().unwrap();
    m.role = Role::new("admin");
    store.force_put_member(&m).unwrap();

    let err = store.commit(&batch).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { entity: "member", .. }));
    let license = store.get_license(&org, licenses[0]).unwrap().unwrap();
    assert_eq!(license.assigned_member_id, None);
    assert_eq!(license.version, 1);
}

#[test]
fn seat_guard_rejects_changed_count() {
    let (store, org, licenses, member) = seeded();
    let mut batch = assign_batch(&store, &org, licenses[0], member);
    batch.guard(BatchGuard::SeatsInUse(1));
    assert!(store.commit(&batch).unwrap_err().is_conflict());

    let mut batch = assign_batch(&store, &org, licenses[0], member);
    batch.guard(BatchGuard::SeatsInUse(0));
    store.commit(&batch).unwrap();
}

#[test]
fn delete_is_version_checked() {
    let (store, org, _, member) = seeded();
    let mut batch = WriteBatch::new(org.clone());
    batch.delete_member(member, 7);
    assert!(store.commit(&batch).unwrap_err().is_conflict());

    let mut batch = WriteBatch::new(org.clone());
    batch.delete_member(member, 1);
    store.commit(&batch).unwrap();
    assert!(store.get_member(&org, member).unwrap().is_none());
}

#[test]
fn writes_are_scoped_to_the_batch_org() {
    let (store, org, licenses, member) = seeded();
    let mut batch = assign_batch(&store, &org, licenses[0], member);
    batch.org = OrgId::new("intruder");
    assert!(store.commit(&batch).unwrap_err().is_conflict());
}

#[test]
fn force_put_stores_drift_verbatim() {
    let (store, org, licenses, member) = seeded();
    let mut license = store.get_license(&org, licenses[0]).unwrap().unwrap();
    license.assigned_member_id = Some(MemberId(999));
    license.assigned_at = Some(Utc::now());
    store.force_put_license(&license).unwrap();

    let stored = store.get_license(&org, licenses[0]).unwrap().unwrap();
    assert_eq!(stored.assigned_member_id, Some(MemberId(999)));
    assert_eq!(stored.version, 2);

    let mut m = store.get_member(&org, member).unwrap().unwrap();
    m.assigned_license_id = Some(LicenseId(4242));
    store.force_put_member(&m).unwrap();
    assert_eq!(
        store.get_member(&org, member).unwrap().unwrap().assigned_license_id,
        Some(LicenseId(4242))
    );
}

#[test]
fn revoke_unknown_license_is_not_found() {
    let (store, org, _, _) = seeded();
    assert!(matches!(
        store.revoke_license(&org, LicenseId(404)),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn roles_come_back_normalized() {
    let (store, org, _, _) = seeded();
    let id = store.create_member(&org, "pay@example.com", Role::new(" Billing ")).unwrap();
    assert_eq!(store.get_member(&org, id).unwrap().unwrap().role.as_str(), "billing");
}

#[test]
fn reports_round_trip_newest_first() {
    let (store, org, _, _) = seeded();
    for i in 0..3 {
        let mut report = ReconcileReport::new(format!("scan-{}", i), org.clone(), Utc::now());
        report.record_found(AnomalyKind::QuotaExceeded);
        store.record_report(&report).unwrap();
    }
    let recent = store.recent_reports(&org, 2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].scan_id, "scan-2");
    assert_eq!(recent[0].found(AnomalyKind::QuotaExceeded), 1);
    assert!(store.recent_reports(&OrgId::new("other"), 5).unwrap().is_empty());
}

#[test]
fn read_pool_matches_individual_lists() {
    let (store, org, licenses, member) = seeded();
    store.commit(&assign_batch(&store, &org, licenses[0], member)).unwrap();

    let view = store.read_pool(&org).unwrap();
    assert_eq!(view.licenses, store.list_licenses(&org, LicenseFilter::All).unwrap());
    assert_eq!(view.members, store.list_members(&org).unwrap());
    assert_eq!(view.licenses[0].assigned_member_id, Some(member));

    let empty = store.read_pool(&OrgId::new("other")).unwrap();
    assert!(empty.licenses.is_empty() && empty.members.is_empty());
}
