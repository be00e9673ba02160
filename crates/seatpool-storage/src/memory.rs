//! `InMemorySeatStore` — the store contract over `BTreeMap`s behind a mutex.
//!
//! Commits apply to a copy of the tables and swap it in only when every
//! version and guard matched, so a failed batch leaves nothing behind.
//! Fault injection hooks let tests force conflicts, outages, latency, and
//! a concurrent write landing just before a commit.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use seatpool_core::errors::{StoreError, StoreResult};
use seatpool_core::models::{
    License, LicenseFilter, LicenseId, LicenseStatus, Member, MemberId, OrgId, ReconcileReport,
    Role, Tier,
};
use seatpool_core::traits::{
    BatchGuard, ILicensePool, IMemberDirectory, IReconcileLog, ISeatAdmin, ISeatStore,
    ITierSource, PoolView, WriteBatch, WriteOp,
};

/// Runs against the tables right before the next commit is validated.
pub type CommitHook = Box<dyn FnOnce(&mut MemoryTables) + Send>;

/// Raw table state. Public so tests can inspect and corrupt it directly.
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub orgs: BTreeMap<OrgId, String>,
    pub licenses: BTreeMap<LicenseId, License>,
    pub members: BTreeMap<MemberId, Member>,
    pub reports: Vec<ReconcileReport>,
    next_license_id: i64,
    next_member_id: i64,
}

impl MemoryTables {
    fn seats_in_use(&self, org: &OrgId) -> u32 {
        self.licenses
            .values()
            .filter(|l| &l.org_id == org && l.is_seat_in_use())
            .count() as u32
    }

    fn apply(&mut self, batch: &WriteBatch) -> StoreResult<()> {
        for guard in &batch.guards {
            match guard {
                BatchGuard::SeatsInUse(expected) => {
                    if self.seats_in_use(&batch.org) != *expected {
                        return Err(StoreError::conflict("pool", &batch.org));
                    }
                }
            }
        }

        for op in &batch.ops {
            match op {
                WriteOp::UpdateLicense {
                    license,
                    expected_version,
                } => {
                    let stored = self
                        .licenses
                        .get_mut(&license.id)
                        .filter(|l| l.org_id == batch.org && l.version == *expected_version)
                        .ok_or_else(|| StoreError::conflict("license", license.id))?;
                    stored.assigned_member_id = license.assigned_member_id;
                    stored.assigned_at = license.assigned_at;
                    stored.release_history = license.release_history.clone();
                    stored.version += 1;
                }
                WriteOp::UpdateMember {
                    member,
                    expected_version,
                } => {
                    let stored = self
                        .members
                        .get_mut(&member.id)
                        .filter(|m| m.org_id == batch.org && m.version == *expected_version)
                        .ok_or_else(|| StoreError::conflict("member", member.id))?;
                    stored.assigned_license_id = member.assigned_license_id;
                    stored.version += 1;
                }
                WriteOp::DeleteMember {
                    id,
                    expected_version,
                } => {
                    let matches = self
                        .members
                        .get(id)
                        .is_some_and(|m| m.org_id == batch.org && m.version == *expected_version);
                    if !matches {
                        return Err(StoreError::conflict("member", id));
                    }
                    self.members.remove(id);
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Faults {
    conflicts: u32,
    unavailable: bool,
    unavailable_after_commits: Option<u32>,
    latency: Option<Duration>,
    before_commit: Option<CommitHook>,
    commit_attempts: u64,
    commits: u64,
}

/// Store contract in memory, for tests and embedding.
#[derive(Default)]
pub struct InMemorySeatStore {
    tables: Mutex<MemoryTables>,
    faults: Mutex<Faults>,
}

impl InMemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` commits with `Conflict`.
    pub fn inject_conflicts(&self, n: u32) {
        if let Ok(mut f) = self.faults.lock() {
            f.conflicts = n;
        }
    }

    /// Make every call return `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut f) = self.faults.lock() {
            f.unavailable = unavailable;
            f.unavailable_after_commits = None;
        }
    }

    /// Go unavailable once `n` more commits have succeeded.
    pub fn unavailable_after_commits(&self, n: u32) {
        if let Ok(mut f) = self.faults.lock() {
            f.unavailable_after_commits = Some(n);
        }
    }

    /// Sleep this long on every call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut f) = self.faults.lock() {
            f.latency = latency;
        }
    }

    /// Mutate the tables just before the next commit is validated,
    /// as if another writer got there first.
    pub fn on_next_commit(&self, hook: impl FnOnce(&mut MemoryTables) + Send + 'static) {
        if let Ok(mut f) = self.faults.lock() {
            f.before_commit = Some(Box::new(hook));
        }
    }

    /// Successful non-empty commits so far.
    pub fn commit_count(&self) -> u64 {
        self.faults.lock().map(|f| f.commits).unwrap_or(0)
    }

    /// Commit calls so far, including rejected ones.
    pub fn commit_attempts(&self) -> u64 {
        self.faults.lock().map(|f| f.commit_attempts).unwrap_or(0)
    }

    /// Copy of the current tables.
    pub fn snapshot(&self) -> StoreResult<MemoryTables> {
        self.with_tables(|t| Ok(t.clone()))
    }

    /// Direct mutable access, bypassing versions and faults.
    pub fn with_tables_mut<T>(&self, f: impl FnOnce(&mut MemoryTables) -> T) -> StoreResult<T> {
        let mut tables = self.lock_tables()?;
        Ok(f(&mut tables))
    }

    fn lock_tables(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryTables>> {
        self.tables.lock().map_err(|e| StoreError::Unavailable {
            reason: format!("memory store lock poisoned: {}", e),
        })
    }

    fn check_available(&self) -> StoreResult<()> {
        let latency = {
            let f = self.faults.lock().map_err(|e| StoreError::Unavailable {
                reason: format!("fault lock poisoned: {}", e),
            })?;
            if f.unavailable {
                return Err(StoreError::Unavailable {
                    reason: "memory store marked unavailable".to_string(),
                });
            }
            f.latency
        };
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        Ok(())
    }

    fn with_tables<T>(&self, f: impl FnOnce(&MemoryTables) -> StoreResult<T>) -> StoreResult<T> {
        self.check_available()?;
        let tables = self.lock_tables()?;
        f(&tables)
    }

    fn with_tables_write<T>(
        &self,
        f: impl FnOnce(&mut MemoryTables) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.check_available()?;
        let mut tables = self.lock_tables()?;
        f(&mut tables)
    }
}

impl ILicensePool for InMemorySeatStore {
    fn get_license(&self, org: &OrgId, id: LicenseId) -> StoreResult<Option<License>> {
        self.with_tables(|t| Ok(t.licenses.get(&id).filter(|l| &l.org_id == org).cloned()))
    }

    fn list_licenses(&self, org: &OrgId, filter: LicenseFilter) -> StoreResult<Vec<License>> {
        self.with_tables(|t| {
            Ok(t.licenses
                .values()
                .filter(|l| &l.org_id == org && filter.matches(l))
                .cloned()
                .collect())
        })
    }
}

impl IMemberDirectory for InMemorySeatStore {
    fn get_member(&self, org: &OrgId, id: MemberId) -> StoreResult<Option<Member>> {
        self.with_tables(|t| Ok(t.members.get(&id).filter(|m| &m.org_id == org).cloned()))
    }

    fn list_members(&self, org: &OrgId) -> StoreResult<Vec<Member>> {
        self.with_tables(|t| {
            Ok(t.members
                .values()
                .filter(|m| &m.org_id == org)
                .cloned()
                .collect())
        })
    }
}

impl ISeatStore for InMemorySeatStore {
    fn commit(&self, batch: &WriteBatch) -> StoreResult<()> {
        self.check_available()?;
        let hook = {
            let mut f = self.faults.lock().map_err(|e| StoreError::Unavailable {
                reason: format!("fault lock poisoned: {}", e),
            })?;
            f.commit_attempts += 1;
            if f.conflicts > 0 {
                f.conflicts -= 1;
                return Err(StoreError::conflict("batch", &batch.org));
            }
            f.before_commit.take()
        };

        let mut tables = self.lock_tables()?;
        if let Some(hook) = hook {
            hook(&mut tables);
        }
        if batch.is_empty() {
            return Ok(());
        }

        let mut next = tables.clone();
        next.apply(batch)?;
        *tables = next;
        drop(tables);

        if let Ok(mut f) = self.faults.lock() {
            f.commits += 1;
            if let Some(remaining) = f.unavailable_after_commits {
                if remaining <= 1 {
                    f.unavailable = true;
                    f.unavailable_after_commits = None;
                } else {
                    f.unavailable_after_commits = Some(remaining - 1);
                }
            }
        }
        Ok(())
    }

    fn read_pool(&self, org: &OrgId) -> StoreResult<PoolView> {
        self.with_tables(|t| {
            Ok(PoolView {
                licenses: t.licenses.values().filter(|l| &l.org_id == org).cloned().collect(),
                members: t.members.values().filter(|m| &m.org_id == org).cloned().collect(),
            })
        })
    }
}

impl ITierSource for InMemorySeatStore {
    fn tier_for(&self, org: &OrgId) -> StoreResult<Option<String>> {
        self.with_tables(|t| Ok(t.orgs.get(org).cloned()))
    }
}

impl ISeatAdmin for InMemorySeatStore {
    fn upsert_organization(&self, org: &OrgId, tier: Tier) -> StoreResult<()> {
        self.with_tables_write(|t| {
            t.orgs.insert(org.clone(), tier.as_str().to_string());
            Ok(())
        })
    }

    fn issue_license(&self, org: &OrgId, tier: Tier) -> StoreResult<LicenseId> {
        self.with_tables_write(|t| {
            let next = t
                .next_license_id
                .max(t.licenses.keys().next_back().map_or(0, |id| id.0))
                + 1;
            t.next_license_id = next;
            let id = LicenseId(next);
            t.licenses.insert(
                id,
                License {
                    id,
                    org_id: org.clone(),
                    tier,
                    status: LicenseStatus::Active,
                    assigned_member_id: None,
                    assigned_at: None,
                    release_history: Vec::new(),
                    version: 1,
                },
            );
            Ok(id)
        })
    }

    fn revoke_license(&self, org: &OrgId, id: LicenseId) -> StoreResult<()> {
        self.with_tables_write(|t| {
            let license = t
                .licenses
                .get_mut(&id)
                .filter(|l| &l.org_id == org)
                .ok_or_else(|| StoreError::not_found("license", id))?;
            license.status = LicenseStatus::Revoked;
            license.version += 1;
            Ok(())
        })
    }

    fn create_member(&self, org: &OrgId, email: &str, role: Role) -> StoreResult<MemberId> {
        self.with_tables_write(|t| {
            let next = t
                .next_member_id
                .max(t.members.keys().next_back().map_or(0, |id| id.0))
                + 1;
            t.next_member_id = next;
            let id = MemberId(next);
            t.members.insert(
                id,
                Member {
                    id,
                    org_id: org.clone(),
                    email: email.to_string(),
                    role,
                    assigned_license_id: None,
                    version: 1,
                },
            );
            Ok(id)
        })
    }

    fn force_put_license(&self, license: &License) -> StoreResult<()> {
        self.with_tables_write(|t| {
            let version = t
                .licenses
                .get(&license.id)
                .map_or(license.version.max(1), |l| l.version + 1);
            t.licenses.insert(
                license.id,
                License {
                    version,
                    ..license.clone()
                },
            );
            Ok(())
        })
    }

    fn force_put_member(&self, member: &Member) -> StoreResult<()> {
        if member.email.trim().is_empty() {
            return Err(StoreError::Corrupt {
                details: format!("member {} has an empty email", member.id),
            });
        }
        self.with_tables_write(|t| {
            let version = t
                .members
                .get(&member.id)
                .map_or(member.version.max(1), |m| m.version + 1);
            t.members.insert(
                member.id,
                Member {
                    version,
                    ..member.clone()
                },
            );
            Ok(())
        })
    }
}

impl IReconcileLog for InMemorySeatStore {
    fn record_report(&self, report: &ReconcileReport) -> StoreResult<()> {
        self.with_tables_write(|t| {
            t.reports.push(report.clone());
            Ok(())
        })
    }

    fn recent_reports(&self, org: &OrgId, limit: usize) -> StoreResult<Vec<ReconcileReport>> {
        self.with_tables(|t| {
            Ok(t.reports
                .iter()
                .rev()
                .filter(|r| &r.org_id == org)
                .take(limit)
                .cloned()
                .collect())
        })
    }
}
