//! `AllocationEngine` — single-member seat operations.
//!
//! Every public operation is one staged transaction (`PoolTx`) committed as
//! one version-checked batch and retried from scratch on conflict.

use std::sync::Arc;

use tracing::{debug, info};

use seatpool_core::config::{EngineConfig, SeatPoolConfig};
use seatpool_core::errors::{AllocError, AllocResult};
use seatpool_core::models::{LicenseId, MemberId, OrgId};
use seatpool_core::policy::{TierQuota, TierQuotaPolicy};
use seatpool_core::traits::{ISeatStore, ITierSource};

use super::retry::{Abort, RetryPolicy};
use super::staging::{OnMismatch, PoolTx};

/// Seat allocation for organizations whose tier comes from `tiers` and
/// whose licenses and members live in `store`.
///
/// Stateless between calls: every operation reads what it needs, stages its
/// writes in a `PoolTx`, and commits them as one version-checked batch
/// guarded by the seat count it saw. Conflicts are retried under
/// `RetryPolicy`; every other error is returned as is. Cheap to share
/// behind an `Arc` across threads.
pub struct AllocationEngine {
    store: Arc<dyn ISeatStore>,
    tiers: Arc<dyn ITierSource>,
    policy: Arc<TierQuotaPolicy>,
    config: EngineConfig,
    retry: RetryPolicy,
}

impl AllocationEngine {
    pub fn new(
        store: Arc<dyn ISeatStore>,
        tiers: Arc<dyn ITierSource>,
        policy: Arc<TierQuotaPolicy>,
        config: EngineConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            store,
            tiers,
            policy,
            config,
            retry,
        }
    }

    /// Build from a full config: validates it and derives the quota policy.
    pub fn from_config(
        store: Arc<dyn ISeatStore>,
        tiers: Arc<dyn ITierSource>,
        config: &SeatPoolConfig,
    ) -> AllocResult<Self> {
        config.validate()?;
        let policy = TierQuotaPolicy::from_config(&config.policy)?;
        Ok(Self::new(store, tiers, Arc::new(policy), config.engine.clone()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy(&self) -> &TierQuotaPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn ISeatStore> {
        &self.store
    }

    /// Current quota for `org`, looked up through the tier source.
    pub fn quota_for_org(&self, org: &OrgId) -> AllocResult<TierQuota> {
        let tier = self
            .tiers
            .tier_for(org)?
            .ok_or_else(|| AllocError::OrganizationNotFound { org: org.clone() })?;
        Ok(self.policy.quota_for_name(&tier)?)
    }

    /// Run `body` as a retried transaction, recording `actor` in release history.
    pub(crate) fn transact<T>(
        &self,
        org: &OrgId,
        actor: &str,
        op: &'static str,
        mut body: impl FnMut(&mut PoolTx<'_>) -> Result<T, Abort>,
    ) -> AllocResult<T> {
        self.retry.run(op, |attempt| {
            let quota = self.quota_for_org(org)?;
            let mut tx = PoolTx::begin(self.store.as_ref(), org.clone(), &quota, actor);
            let value = body(&mut tx)?;
            debug!(%org, op, attempt, writes = tx.pending_writes(), "Committing");
            tx.commit()?;
            Ok(value)
        })
    }

    /// AssignSeat: hand `member` the oldest free license. Already holding a
    /// consistent seat is success and writes nothing.
    pub fn assign_seat(&self, org: &OrgId, member: MemberId) -> AllocResult<LicenseId> {
        let license = self.transact(org, &self.config.actor, "assign_seat", |tx| tx.assign(member))?;
        info!(%org, %member, %license, "Seat assigned");
        Ok(license)
    }

    /// ReleaseSeat: free `member`'s seat. No seat is a no-op returning None.
    ///
    /// If the member's back-reference names a license that does not point
    /// back, the member side is cleared and committed, then
    /// `LicenseInconsistent` is returned.
    pub fn release_seat(&self, org: &OrgId, member: MemberId) -> AllocResult<Option<LicenseId>> {
        let released = self.transact(org, &self.config.actor, "release_seat", |tx| {
            tx.release(member, OnMismatch::ClearAndReport)
        })?;
        if let Some(license) = released {
            info!(%org, %member, %license, "Seat released");
        }
        Ok(released)
    }

    /// Transfer: release `from`'s seat and assign `to` in one transaction.
    ///
    /// `to` is validated before anything is staged. An inconsistent seat on
    /// `from` aborts the whole transfer. If `to` already holds a seat it is
    /// kept and returned, and `from` is still released.
    pub fn transfer(&self, org: &OrgId, from: MemberId, to: MemberId) -> AllocResult<LicenseId> {
        if from == to {
            return self.assign_seat(org, to);
        }
        let license = self.transact(org, &self.config.actor, "transfer", |tx| {
            let target = tx.member(to)?;
            if tx.quota().is_exempt(&target.role) {
                return Err(Abort::Error(AllocError::MemberExempt {
                    member: to,
                    role: target.role,
                }));
            }
            tx.release(from, OnMismatch::Abort)?;
            tx.assign(to)
        })?;
        info!(%org, %from, %to, %license, "Seat transferred");
        Ok(license)
    }

    /// OnMemberRemoved: release whatever seat the member holds, ahead of the
    /// directory deleting it. If the member is already gone, clears any
    /// license still pointing at it.
    ///
    /// Behaves like `release_seat` on a back-reference that does not match
    /// the license side: the member side and any license still pointing at
    /// the member are cleared and committed, then `LicenseInconsistent` is
    /// returned.
    pub fn on_member_removed(&self, org: &OrgId, member: MemberId) -> AllocResult<Option<LicenseId>> {
        let released = self.transact(org, &self.config.actor, "on_member_removed", |tx| {
            let mut released = match tx.try_member(member)? {
                Some(_) => tx.release(member, OnMismatch::ClearAndReport)?,
                None => None,
            };
            for stray in tx.all_pointing_at(member)? {
                released.get_or_insert(stray.id);
                tx.detach(stray)?;
            }
            tx.clear_revoked()?;
            Ok(released)
        })?;
        info!(%org, %member, released = ?released, "Member removal handled");
        Ok(released)
    }

    /// Release the member's seat and delete the member in one transaction.
    pub fn remove_member(&self, org: &OrgId, member: MemberId) -> AllocResult<Option<LicenseId>> {
        let released = self.transact(org, &self.config.actor, "remove_member", |tx| {
            let mut released = tx.release(member, OnMismatch::Clear)?;
            for stray in tx.all_pointing_at(member)? {
                released.get_or_insert(stray.id);
                tx.detach(stray)?;
            }
            tx.clear_revoked()?;
            tx.delete_member(member);
            Ok(released)
        })?;
        info!(%org, %member, released = ?released, "Member removed");
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatpool_core::traits::StaticTierSource;
    use seatpool_core::models::Tier;

    struct NoStore;

    impl seatpool_core::traits::ILicensePool for NoStore {
        fn get_license(
            &self,
            _: &OrgId,
            _: LicenseId,
        ) -> seatpool_core::StoreResult<Option<seatpool_core::License>> {
            Ok(None)
        }
        fn list_licenses(
            &self,
            _: &OrgId,
            _: seatpool_core::LicenseFilter,
        ) -> seatpool_core::StoreResult<Vec<seatpool_core::License>> {
            Ok(vec![])
        }
    }

    impl seatpool_core::traits::IMemberDirectory for NoStore {
        fn get_member(
            &self,
            _: &OrgId,
            _: MemberId,
        ) -> seatpool_core::StoreResult<Option<seatpool_core::Member>> {
            Ok(None)
        }
        fn list_members(&self, _: &OrgId) -> seatpool_core::StoreResult<Vec<seatpool_core::Member>> {
            Ok(vec![])
        }
    }

    impl ISeatStore for NoStore {
        fn commit(&self, _: &seatpool_core::traits::WriteBatch) -> seatpool_core::StoreResult<()> {
            Ok(())
        }
    }

    fn engine(tiers: StaticTierSource) -> AllocationEngine {
        AllocationEngine::new(
            Arc::new(NoStore),
            Arc::new(tiers),
            Arc::new(TierQuotaPolicy::default()),
            EngineConfig::default(),
        )
    }

    #[test]
    fn unknown_org_is_not_found() {
        let engine = engine(StaticTierSource::new());
        let err = engine.assign_seat(&OrgId::new("ghost"), MemberId(1)).unwrap_err();
        assert!(matches!(err, AllocError::OrganizationNotFound { .. }));
    }

    #[test]
    fn unknown_tier_surfaces() {
        let org = OrgId::new("acme");
        let tiers = StaticTierSource::new();
        tiers.set_raw(&org, "platinum");
        let err = engine(tiers).assign_seat(&org, MemberId(1)).unwrap_err();
        assert!(matches!(err, AllocError::UnknownTier(_)));
    }

    #[test]
    fn missing_member_is_not_found() {
        let org = OrgId::new("acme");
        let engine = engine(StaticTierSource::new().with(&org, Tier::Basic));
        let err = engine.release_seat(&org, MemberId(7)).unwrap_err();
        assert_eq!(
            err,
            AllocError::MemberNotFound {
                org: org.clone(),
                member: MemberId(7)
            }
        );
    }

    #[test]
    fn from_config_rejects_invalid() {
        let mut config = SeatPoolConfig::default();
        config.engine.max_attempts = 0;
        let result = AllocationEngine::from_config(
            Arc::new(NoStore),
            Arc::new(StaticTierSource::new()),
            &config,
        );
        assert!(matches!(result, Err(AllocError::Config(_))));
    }
}
