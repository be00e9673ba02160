//! Staged read-modify-write transaction over one organization's pool.
//!
//! Records are read through the store once and then served from the stage,
//! so a transaction sees its own writes. `commit` turns every dirty record
//! into a version-checked op; if the pool was listed, the number of seats
//! in use observed at that moment becomes a guard on the batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use seatpool_core::errors::AllocError;
use seatpool_core::models::{License, LicenseFilter, LicenseId, Member, MemberId, OrgId};
use seatpool_core::policy::TierQuota;
use seatpool_core::traits::{BatchGuard, ISeatStore, WriteBatch};

use super::retry::Abort;

struct Staged<T> {
    record: T,
    read_version: u64,
    dirty: bool,
}

impl<T> Staged<T> {
    fn clean(record: T, read_version: u64) -> Self {
        Self {
            record,
            read_version,
            dirty: false,
        }
    }
}

/// What to do when a member's back-reference names a license that does not point back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnMismatch {
    /// Fail the transaction with `LicenseInconsistent`, nothing written.
    Abort,
    /// Clear the member side, commit, then report `LicenseInconsistent`.
    ClearAndReport,
    /// Clear the member side silently.
    Clear,
}

pub(crate) struct PoolTx<'a> {
    store: &'a dyn ISeatStore,
    org: OrgId,
    quota: &'a TierQuota,
    actor: &'a str,
    now: DateTime<Utc>,
    licenses: BTreeMap<LicenseId, Staged<License>>,
    members: BTreeMap<MemberId, Staged<Member>>,
    missing_licenses: Vec<LicenseId>,
    missing_members: Vec<MemberId>,
    deleted: BTreeMap<MemberId, u64>,
    /// Seats in use when the pool was listed.
    listed_seats: Option<u32>,
    deferred: Option<AllocError>,
}

impl<'a> PoolTx<'a> {
    pub(crate) fn begin(store: &'a dyn ISeatStore, org: OrgId, quota: &'a TierQuota, actor: &'a str) -> Self {
        Self {
            store,
            org,
            quota,
            actor,
            now: Utc::now(),
            licenses: BTreeMap::new(),
            members: BTreeMap::new(),
            missing_licenses: Vec::new(),
            missing_members: Vec::new(),
            deleted: BTreeMap::new(),
            listed_seats: None,
            deferred: None,
        }
    }

    pub(crate) fn org(&self) -> &OrgId {
        &self.org
    }

    pub(crate) fn quota(&self) -> &TierQuota {
        self.quota
    }

    // ─── Reads ──────────────────────────────────────────────────────────

    /// Member by id, or None if absent (or deleted in this transaction).
    pub(crate) fn try_member(&mut self, id: MemberId) -> Result<Option<Member>, Abort> {
        if self.deleted.contains_key(&id) || self.missing_members.contains(&id) {
            return Ok(None);
        }
        if let Some(staged) = self.members.get(&id) {
            return Ok(Some(staged.record.clone()));
        }
        match self.store.get_member(&self.org, id)? {
            Some(member) => {
                let version = member.version;
                self.members.insert(id, Staged::clean(member.clone(), version));
                Ok(Some(member))
            }
            None => {
                self.missing_members.push(id);
                Ok(None)
            }
        }
    }

    /// Member by id; absent is `MemberNotFound`.
    pub(crate) fn member(&mut self, id: MemberId) -> Result<Member, Abort> {
        self.try_member(id)?.ok_or_else(|| {
            Abort::Error(AllocError::MemberNotFound {
                org: self.org.clone(),
                member: id,
            })
        })
    }

    pub(crate) fn license(&mut self, id: LicenseId) -> Result<Option<License>, Abort> {
        if self.missing_licenses.contains(&id) {
            return Ok(None);
        }
        if let Some(staged) = self.licenses.get(&id) {
            return Ok(Some(staged.record.clone()));
        }
        match self.store.get_license(&self.org, id)? {
            Some(license) => {
                let version = license.version;
                self.licenses.insert(id, Staged::clean(license.clone(), version));
                Ok(Some(license))
            }
            None => {
                self.missing_licenses.push(id);
                Ok(None)
            }
        }
    }

    /// Every license in the organization (staged view), ordered by id.
    /// The first call lists the pool and pins the seat count for the guard.
    pub(crate) fn pool(&mut self) -> Result<Vec<License>, Abort> {
        if self.listed_seats.is_none() {
            let listed = self.store.list_licenses(&self.org, LicenseFilter::All)?;
            self.listed_seats = Some(listed.iter().filter(|l| l.is_seat_in_use()).count() as u32);
            for license in listed {
                let version = license.version;
                self.missing_licenses.retain(|id| *id != license.id);
                self.licenses
                    .entry(license.id)
                    .or_insert_with(|| Staged::clean(license, version));
            }
        }
        Ok(self.licenses.values().map(|s| s.record.clone()).collect())
    }

    /// ACTIVE licenses currently pointing at `member`.
    pub(crate) fn licenses_pointing_at(&mut self, member: MemberId) -> Result<Vec<License>, Abort> {
        Ok(self
            .pool()?
            .into_iter()
            .filter(|l| l.is_active() && l.is_assigned_to(member))
            .collect())
    }

    /// Licenses of any status still pointing at `member`.
    pub(crate) fn all_pointing_at(&mut self, member: MemberId) -> Result<Vec<License>, Abort> {
        Ok(self
            .pool()?
            .into_iter()
            .filter(|l| l.is_assigned_to(member))
            .collect())
    }

    pub(crate) fn seats_in_use(&mut self) -> Result<u32, Abort> {
        Ok(self.pool()?.iter().filter(|l| l.is_seat_in_use()).count() as u32)
    }

    // ─── Writes ─────────────────────────────────────────────────────────

    pub(crate) fn put_license(&mut self, license: License) {
        match self.licenses.get_mut(&license.id) {
            Some(staged) => {
                staged.record = license;
                staged.dirty = true;
            }
            None => {
                let version = license.version;
                self.licenses.insert(
                    license.id,
                    Staged {
                        record: license,
                        read_version: version,
                        dirty: true,
                    },
                );
            }
        }
    }

    pub(crate) fn put_member(&mut self, member: Member) {
        match self.members.get_mut(&member.id) {
            Some(staged) => {
                staged.record = member;
                staged.dirty = true;
            }
            None => {
                let version = member.version;
                self.members.insert(
                    member.id,
                    Staged {
                        record: member,
                        read_version: version,
                        dirty: true,
                    },
                );
            }
        }
    }

    pub(crate) fn delete_member(&mut self, id: MemberId) {
        if let Some(staged) = self.members.remove(&id) {
            self.deleted.insert(id, staged.read_version);
        }
    }

    /// Report `error` after a successful commit.
    pub(crate) fn defer(&mut self, error: AllocError) {
        self.deferred.get_or_insert(error);
    }

    // ─── Primitives ─────────────────────────────────────────────────────

    /// Clear `license`'s assignment with a history entry, and clear the
    /// assigned member's back-reference if it points at this license.
    /// Returns the member released, if any.
    pub(crate) fn detach(&mut self, mut license: License) -> Result<Option<MemberId>, Abort> {
        let Some(member_id) = license.release(self.now, self.actor) else {
            return Ok(None);
        };
        let license_id = license.id;
        self.put_license(license);
        if let Some(mut member) = self.try_member(member_id)? {
            if member.assigned_license_id == Some(license_id) {
                member.assigned_license_id = None;
                self.put_member(member);
            }
        }
        Ok(Some(member_id))
    }

    /// Detach every REVOKED license in the pool that still carries an
    /// assignment. Returns the licenses cleared.
    pub(crate) fn clear_revoked(&mut self) -> Result<Vec<LicenseId>, Abort> {
        let revoked: Vec<License> = self
            .pool()?
            .into_iter()
            .filter(|l| !l.is_active() && l.assigned_member_id.is_some())
            .collect();
        let mut cleared = Vec::with_capacity(revoked.len());
        for license in revoked {
            cleared.push(license.id);
            self.detach(license)?;
        }
        if !cleared.is_empty() {
            debug!(org = %self.org, cleared = cleared.len(), "Cleared revoked assignments");
        }
        Ok(cleared)
    }

    /// ReleaseSeat within this transaction.
    pub(crate) fn release(&mut self, member_id: MemberId, on_mismatch: OnMismatch) -> Result<Option<LicenseId>, Abort> {
        let mut member = self.member(member_id)?;
        let Some(license_id) = member.assigned_license_id else {
            return Ok(None);
        };

        match self.license(license_id)? {
            Some(license) if license.is_assigned_to(member_id) => {
                self.detach(license)?;
                Ok(Some(license_id))
            }
            other => {
                let detail = match other {
                    None => "back-reference names a license that does not exist".to_string(),
                    Some(l) => match l.assigned_member_id {
                        Some(holder) => format!("license is assigned to {}", holder),
                        None => "license is not assigned".to_string(),
                    },
                };
                let error = AllocError::LicenseInconsistent {
                    member: member_id,
                    license: Some(license_id),
                    detail,
                };
                if on_mismatch == OnMismatch::Abort {
                    return Err(Abort::Error(error));
                }
                member.assigned_license_id = None;
                self.put_member(member);
                if on_mismatch == OnMismatch::ClearAndReport {
                    self.defer(error);
                } else {
                    warn!(
                        org = %self.org,
                        member = %member_id,
                        license = %license_id,
                        error = %error,
                        "Cleared inconsistent back-reference"
                    );
                }
                Ok(None)
            }
        }
    }

    /// AssignSeat within this transaction.
    pub(crate) fn assign(&mut self, member_id: MemberId) -> Result<LicenseId, Abort> {
        let mut member = self.member(member_id)?;
        if self.quota.is_exempt(&member.role) {
            return Err(Abort::Error(AllocError::MemberExempt {
                member: member_id,
                role: member.role.clone(),
            }));
        }

        if let Some(license_id) = member.assigned_license_id {
            match self.license(license_id)? {
                Some(license) if license.is_assigned_to(member_id) && license.is_active() => {
                    return Ok(license_id);
                }
                Some(license) if license.is_assigned_to(member_id) => {
                    // Revoked but still held: clear it and hand out a fresh seat.
                    self.detach(license)?;
                    member = self.member(member_id)?;
                }
                other => {
                    return Err(Abort::Error(AllocError::LicenseInconsistent {
                        member: member_id,
                        license: Some(license_id),
                        detail: match other {
                            None => "back-reference names a license that does not exist".into(),
                            Some(_) => "license does not point back at the member".into(),
                        },
                    }));
                }
            }
        }

        if !self.clear_revoked()?.is_empty() {
            member = self.member(member_id)?;
        }

        if let Some(stray) = self.licenses_pointing_at(member_id)?.first() {
            return Err(Abort::Error(AllocError::LicenseInconsistent {
                member: member_id,
                license: Some(stray.id),
                detail: "license points at the member without a back-reference".into(),
            }));
        }

        let in_use = self.seats_in_use()?;
        let (org, seat_quota) = (self.org.clone(), self.quota.seat_quota);
        let exhausted = move || {
            Abort::Error(AllocError::QuotaExhausted {
                org,
                assigned: in_use,
                seat_quota,
            })
        };
        if in_use >= seat_quota {
            return Err(exhausted());
        }
        let Some(mut license) = self.pool()?.into_iter().find(License::is_available) else {
            return Err(exhausted());
        };

        license.assign(member_id, self.now);
        let license_id = license.id;
        self.put_license(license);
        member.assigned_license_id = Some(license_id);
        self.put_member(member);
        Ok(license_id)
    }

    // ─── Commit ─────────────────────────────────────────────────────────

    /// Number of records this transaction would write.
    pub(crate) fn pending_writes(&self) -> usize {
        self.licenses.values().filter(|s| s.dirty).count()
            + self.members.values().filter(|s| s.dirty).count()
            + self.deleted.len()
    }

    pub(crate) fn commit(self) -> Result<(), Abort> {
        let mut batch = WriteBatch::new(self.org.clone());
        for staged in self.licenses.into_values().filter(|s| s.dirty) {
            batch.update_license(staged.record, staged.read_version);
        }
        for staged in self.members.into_values().filter(|s| s.dirty) {
            batch.update_member(staged.record, staged.read_version);
        }
        for (id, version) in self.deleted {
            batch.delete_member(id, version);
        }

        if !batch.is_empty() {
            if let Some(seats) = self.listed_seats {
                batch.guard(BatchGuard::SeatsInUse(seats));
            }
            self.store.commit(&batch)?;
        }

        match self.deferred {
            Some(error) => Err(Abort::Error(error)),
            None => Ok(()),
        }
    }
}
