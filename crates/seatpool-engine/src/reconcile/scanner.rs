//! `ReconciliationScanner` — full-pool drift detection and repair.
//!
//! One pass per anomaly class, in a fixed order, each on a fresh snapshot.
//! Every heal is its own engine transaction that re-checks its precondition
//! against the staged state; a precondition that no longer holds makes the
//! heal stale (no writes) and the scan moves on.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use seatpool_core::config::ReconcileConfig;
use seatpool_core::errors::{AllocError, AllocResult};
use seatpool_core::models::{
    AnomalyKind, FlaggedItem, License, LicenseId, Member, MemberId, OrgId, ReconcileReport,
};
use seatpool_core::policy::TierQuota;
use seatpool_core::traits::IReconcileLog;

use super::control::ScanControl;
use super::snapshot::{most_recent_first, Snapshot};
use crate::allocation::staging::PoolTx;
use crate::allocation::AllocationEngine;
use crate::allocation::Abort;

/// Finds and repairs drift between the license pool and the member
/// directory of one organization at a time.
///
/// Detection works on fresh snapshots; each repair is a separate engine
/// transaction that re-checks its precondition, so the scanner can run
/// alongside live traffic. Results land in a `ReconcileReport`, which is
/// also written to the report log when one is attached.
pub struct ReconciliationScanner {
    engine: Arc<AllocationEngine>,
    config: ReconcileConfig,
    log: Option<Arc<dyn IReconcileLog>>,
}

impl ReconciliationScanner {
    pub fn new(engine: Arc<AllocationEngine>, config: ReconcileConfig) -> Self {
        Self {
            engine,
            config,
            log: None,
        }
    }

    /// Persist every report to `log` (when `persist_reports` is on).
    pub fn with_report_log(mut self, log: Arc<dyn IReconcileLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile: scan one organization to completion.
    pub fn reconcile(&self, org: &OrgId) -> AllocResult<ReconcileReport> {
        self.reconcile_with(org, &ScanControl::new())
    }

    /// Reconcile with a cancellation handle. A cancelled scan returns its
    /// partial report marked `incomplete`.
    pub fn reconcile_with(&self, org: &OrgId, control: &ScanControl) -> AllocResult<ReconcileReport> {
        let quota = self.engine.quota_for_org(org)?;
        let mut report = ReconcileReport::new(Uuid::new_v4().to_string(), org.clone(), Utc::now());
        report.seat_quota = quota.seat_quota;

        let mut scan = Scan {
            engine: &self.engine,
            actor: &self.config.actor,
            org,
            quota,
            control,
            report,
            snapshots: 0,
        };
        let outcome = scan.run();
        let snapshots = scan.snapshots;
        let mut report = scan.report;

        match outcome {
            Ok(()) => {}
            Err(Stop::Cancelled) => {
                report.incomplete = true;
                info!(%org, scan_id = %report.scan_id, "Reconciliation cancelled");
            }
            Err(Stop::Store(e)) => {
                if snapshots == 0 {
                    return Err(e);
                }
                report.incomplete = true;
                warn!(%org, scan_id = %report.scan_id, error = %e, "Reconciliation stopped early");
            }
        }
        report.finished_at = Some(Utc::now());

        info!(
            %org,
            scan_id = %report.scan_id,
            found = report.total_found(),
            healed = report.total_healed(),
            failed = report.heal_failures.len(),
            flagged = report.flagged.len(),
            incomplete = report.incomplete,
            "Reconciliation complete"
        );
        self.persist(&report);
        Ok(report)
    }

    /// ReconcileAll: scan several organizations concurrently.
    pub fn reconcile_all(&self, orgs: &[OrgId]) -> Vec<(OrgId, AllocResult<ReconcileReport>)> {
        let run = || -> Vec<(OrgId, AllocResult<ReconcileReport>)> {
            orgs.par_iter()
                .map(|org| (org.clone(), self.reconcile(org)))
                .collect()
        };

        let mut builder = rayon::ThreadPoolBuilder::new();
        if self.config.parallelism > 0 {
            builder = builder.num_threads(self.config.parallelism);
        }
        match builder.build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!(error = %e, "Could not build reconcile pool, scanning sequentially");
                orgs.iter()
                    .map(|org| (org.clone(), self.reconcile(org)))
                    .collect()
            }
        }
    }

    fn persist(&self, report: &ReconcileReport) {
        if !self.config.persist_reports {
            return;
        }
        if let Some(log) = &self.log {
            if let Err(e) = log.record_report(report) {
                warn!(org = %report.org_id, scan_id = %report.scan_id, error = %e, "Failed to persist reconcile report");
            }
        }
    }
}

enum Stop {
    Cancelled,
    Store(AllocError),
}

struct Scan<'s> {
    engine: &'s AllocationEngine,
    actor: &'s str,
    org: &'s OrgId,
    quota: TierQuota,
    control: &'s ScanControl,
    report: ReconcileReport,
    snapshots: u32,
}

impl Scan<'_> {
    fn run(&mut self) -> Result<(), Stop> {
        self.revoked_assignments()?;
        self.dangling_license_assignments()?;
        self.duplicate_members()?;
        self.multiple_licenses()?;
        self.back_references()?;
        self.exempt_roles()?;
        self.quota_overflow()?;
        self.pool_shortage()
    }

    fn checkpoint(&self) -> Result<(), Stop> {
        if self.control.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Snapshot, Stop> {
        self.checkpoint()?;
        let snapshot = Snapshot::take(self.engine.store().as_ref(), self.org)
            .map_err(|e| Stop::Store(e.into()))?;
        self.snapshots += 1;
        Ok(snapshot)
    }

    /// Run one heal. `body` returns None when the precondition no longer holds.
    fn heal<T>(
        &mut self,
        kind: AnomalyKind,
        subject: String,
        mut body: impl FnMut(&mut PoolTx<'_>) -> Result<Option<T>, Abort>,
    ) -> Result<Option<T>, Stop> {
        self.checkpoint()?;
        match self.engine.transact(self.org, self.actor, "heal", &mut body) {
            Ok(Some(value)) => {
                self.report.record_healed(kind);
                debug!(org = %self.org, %kind, %subject, "Healed");
                Ok(Some(value))
            }
            Ok(None) => {
                self.report.record_stale(kind);
                warn!(org = %self.org, %kind, %subject, "Heal skipped, state changed since detection");
                Ok(None)
            }
            Err(e @ AllocError::StoreUnavailable { .. }) => {
                self.report.record_failure(kind, subject, &e);
                Err(Stop::Store(e))
            }
            Err(e) => {
                warn!(org = %self.org, %kind, %subject, error = %e, "Heal failed");
                self.report.record_failure(kind, subject, &e);
                Ok(None)
            }
        }
    }

    fn revoked_assignments(&mut self) -> Result<(), Stop> {
        let kind = AnomalyKind::RevokedLicenseAssigned;
        let snap = self.snapshot()?;
        for license in snap.licenses.iter().filter(|l| !l.is_active()) {
            let Some(holder) = license.assigned_member_id else {
                continue;
            };
            self.report.record_found(kind);
            let id = license.id;
            self.heal(kind, id.to_string(), |tx| match tx.license(id)? {
                Some(cur) if !cur.is_active() && cur.is_assigned_to(holder) => {
                    tx.detach(cur)?;
                    Ok(Some(()))
                }
                _ => Ok(None),
            })?;
        }
        Ok(())
    }

    fn dangling_license_assignments(&mut self) -> Result<(), Stop> {
        let kind = AnomalyKind::DanglingLicenseAssignment;
        let snap = self.snapshot()?;
        let members = snap.member_ids();
        for license in snap.licenses.iter().filter(|l| l.is_active()) {
            let Some(holder) = license.assigned_member_id else {
                continue;
            };
            if members.contains(&holder) {
                continue;
            }
            self.report.record_found(kind);
            let id = license.id;
            self.heal(kind, id.to_string(), |tx| {
                let Some(cur) = tx.license(id)? else {
                    return Ok(None);
                };
                if !cur.is_active() || !cur.is_assigned_to(holder) || tx.try_member(holder)?.is_some() {
                    return Ok(None);
                }
                tx.detach(cur)?;
                Ok(Some(()))
            })?;
        }
        Ok(())
    }

    fn duplicate_members(&mut self) -> Result<(), Stop> {
        let kind = AnomalyKind::DuplicateMember;
        let snap = self.snapshot()?;
        let mut by_email: BTreeMap<String, Vec<MemberId>> = BTreeMap::new();
        for member in &snap.members {
            by_email.entry(member.normalized_email()).or_default().push(member.id);
        }

        for ids in by_email.into_values().filter(|ids| ids.len() > 1) {
            let Some(&canonical) = ids.iter().min() else {
                continue;
            };
            for duplicate in ids.into_iter().filter(|id| *id != canonical) {
                self.report.record_found(kind);
                self.heal(kind, duplicate.to_string(), |tx| merge_duplicate(tx, canonical, duplicate))?;
            }
        }
        Ok(())
    }

    fn multiple_licenses(&mut self) -> Result<(), Stop> {
        let kind = AnomalyKind::MemberMultipleLicenses;
        let snap = self.snapshot()?;
        let crowded: Vec<MemberId> = snap
            .seats_by_member()
            .into_iter()
            .filter(|(_, seats)| seats.len() > 1)
            .map(|(member, _)| member)
            .collect();

        for member in crowded {
            self.report.record_found(kind);
            self.heal(kind, member.to_string(), |tx| {
                let mut seats = tx.licenses_pointing_at(member)?;
                if seats.len() < 2 {
                    return Ok(None);
                }
                seats.sort_by(most_recent_first);
                let keep = seats[0].id;
                for extra in seats.into_iter().skip(1) {
                    tx.detach(extra)?;
                }
                if let Some(mut holder) = tx.try_member(member)? {
                    if holder.assigned_license_id != Some(keep) {
                        holder.assigned_license_id = Some(keep);
                        tx.put_member(holder);
                    }
                }
                Ok(Some(()))
            })?;
        }
        Ok(())
    }

    fn back_references(&mut self) -> Result<(), Stop> {
        let snap = self.snapshot()?;
        let seats = snap.seats_by_member();
        let mut drifted: Vec<(MemberId, AnomalyKind)> = Vec::new();
        for member in &snap.members {
            let truth = seats
                .get(&member.id)
                .and_then(|held| held.iter().copied().min_by(|a, b| most_recent_first(a, b)))
                .map(|l| l.id);
            if member.assigned_license_id == truth {
                continue;
            }
            let kind = match member.assigned_license_id {
                Some(id) if snap.license(id).is_none() => AnomalyKind::DanglingMemberReference,
                _ => AnomalyKind::BackReferenceMismatch,
            };
            drifted.push((member.id, kind));
        }

        for (member, kind) in drifted {
            self.report.record_found(kind);
            self.heal(kind, member.to_string(), |tx| {
                let Some(mut cur) = tx.try_member(member)? else {
                    return Ok(None);
                };
                let mut held = tx.licenses_pointing_at(member)?;
                held.sort_by(most_recent_first);
                let truth = held.first().map(|l| l.id);
                if cur.assigned_license_id == truth {
                    return Ok(None);
                }
                cur.assigned_license_id = truth;
                tx.put_member(cur);
                Ok(Some(()))
            })?;
        }
        Ok(())
    }

    fn exempt_roles(&mut self) -> Result<(), Stop> {
        let kind = AnomalyKind::ExemptRoleAssigned;
        let snap = self.snapshot()?;
        let seats = snap.seats_by_member();
        let seated_exempt: Vec<MemberId> = snap
            .members
            .iter()
            .filter(|m| self.quota.is_exempt(&m.role))
            .filter(|m| m.assigned_license_id.is_some() || seats.contains_key(&m.id))
            .map(|m| m.id)
            .collect();

        for member in seated_exempt {
            self.report.record_found(kind);
            self.heal(kind, member.to_string(), |tx| release_exempt(tx, member))?;
        }
        Ok(())
    }

    fn quota_overflow(&mut self) -> Result<(), Stop> {
        let kind = AnomalyKind::QuotaExceeded;
        let snap = self.snapshot()?;
        let assigned = snap.seats_in_use();
        let seat_quota = self.quota.seat_quota;
        if assigned <= seat_quota {
            return Ok(());
        }

        self.report.record_found(kind);
        let outcome = self.heal(kind, self.org.to_string(), |tx| {
            let seat_quota = tx.quota().seat_quota;
            let mut seats: Vec<License> = tx.pool()?.into_iter().filter(License::is_seat_in_use).collect();
            if seats.len() as u32 <= seat_quota {
                return Ok(None);
            }
            seats.sort_by(most_recent_first);
            let excess = seats.len() - seat_quota as usize;
            let mut released = Vec::with_capacity(excess);
            for seat in seats.into_iter().take(excess) {
                released.push(seat.id);
                tx.detach(seat)?;
            }
            Ok(Some(released))
        });

        // Flagged even when the heal went stale or the scan has to stop.
        let released: Vec<LicenseId> = match &outcome {
            Ok(Some(ids)) => ids.clone(),
            _ => Vec::new(),
        };
        self.report.flag(FlaggedItem::QuotaExceeded {
            assigned,
            seat_quota,
            released,
        });
        outcome.map(|_| ())
    }

    fn pool_shortage(&mut self) -> Result<(), Stop> {
        let snap = self.snapshot()?;
        let awaiting = snap.awaiting_seat(&self.quota);
        let unassigned = snap.available();
        if awaiting.len() as u32 > unassigned {
            info!(org = %self.org, awaiting = awaiting.len(), unassigned, "Pool shortage");
            self.report.flag(FlaggedItem::PoolShortage {
                awaiting: awaiting.len() as u32,
                unassigned,
                members: awaiting,
            });
        }
        Ok(())
    }
}

/// Merge `duplicate` into `canonical`: its seat moves to the canonical
/// member when that member can take it, otherwise it is released; then the
/// duplicate record is deleted.
fn merge_duplicate(tx: &mut PoolTx<'_>, canonical: MemberId, duplicate: MemberId) -> Result<Option<()>, Abort> {
    let Some(canon) = tx.try_member(canonical)? else {
        return Ok(None);
    };
    let Some(dup) = tx.try_member(duplicate)? else {
        return Ok(None);
    };
    if canon.normalized_email() != dup.normalized_email() {
        return Ok(None);
    }
    let exempt = tx.quota().is_exempt(&canon.role);

    for mut license in tx.all_pointing_at(duplicate)? {
        let canon: Member = tx.member(canonical)?;
        // Seated means an ACTIVE license points at the canonical member. A
        // back-reference alone may be stale and is overwritten below.
        let canon_seated = !tx.licenses_pointing_at(canonical)?.is_empty();
        if license.is_active() && !exempt && !canon_seated {
            license.assigned_member_id = Some(canonical);
            let license_id = license.id;
            tx.put_license(license);
            tx.put_member(Member {
                assigned_license_id: Some(license_id),
                ..canon
            });
        } else {
            tx.detach(license)?;
        }
    }
    tx.delete_member(duplicate);
    Ok(Some(()))
}

/// Clear every seat held by an exempt member, on both sides.
fn release_exempt(tx: &mut PoolTx<'_>, member: MemberId) -> Result<Option<()>, Abort> {
    let Some(cur) = tx.try_member(member)? else {
        return Ok(None);
    };
    if !tx.quota().is_exempt(&cur.role) {
        return Ok(None);
    }
    let held = tx.all_pointing_at(member)?;
    if held.is_empty() && cur.assigned_license_id.is_none() {
        return Ok(None);
    }
    for license in held {
        tx.detach(license)?;
    }
    let mut cur = tx.member(member)?;
    if cur.assigned_license_id.take().is_some() {
        tx.put_member(cur);
    }
    Ok(Some(()))
}
