//! Tier Quota Policy: tier → (seat quota, exempt roles).
//!
//! Pure and immutable per deployment. Built from `PolicyConfig`; construction
//! rejects a table that does not cover every known tier, so lookups on a
//! parsed `Tier` always succeed.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::PolicyConfig;
use crate::errors::{AllocResult, UnknownTierError};
use crate::models::{Role, Tier};

/// Resolved quota for one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierQuota {
    pub tier: Tier,
    pub seat_quota: u32,
    pub exempt_roles: BTreeSet<Role>,
}

impl TierQuota {
    pub fn is_exempt(&self, role: &Role) -> bool {
        self.exempt_roles.contains(role)
    }
}

/// Immutable quota table.
#[derive(Debug, Clone)]
pub struct TierQuotaPolicy {
    table: BTreeMap<Tier, TierQuota>,
}

impl TierQuotaPolicy {
    /// Build from config. Fails if any tier is missing.
    pub fn from_config(config: &PolicyConfig) -> AllocResult<Self> {
        config.validate()?;
        let table = config
            .tiers
            .iter()
            .map(|(tier, entry)| {
                (
                    *tier,
                    TierQuota {
                        tier: *tier,
                        seat_quota: entry.seat_quota,
                        exempt_roles: entry.exempt_roles.clone(),
                    },
                )
            })
            .collect();
        Ok(Self { table })
    }

    /// `QuotaFor(tier)`.
    pub fn quota_for(&self, tier: Tier) -> Result<TierQuota, UnknownTierError> {
        self.table.get(&tier).cloned().ok_or_else(|| UnknownTierError {
            tier: tier.as_str().to_string(),
        })
    }

    /// `QuotaFor` on a raw tier name, as handed over by a tier source.
    pub fn quota_for_name(&self, tier: &str) -> Result<TierQuota, UnknownTierError> {
        let tier: Tier = tier.parse()?;
        self.quota_for(tier)
    }
}

impl Default for TierQuotaPolicy {
    fn default() -> Self {
        let table = PolicyConfig::default()
            .tiers
            .into_iter()
            .map(|(tier, entry)| {
                (
                    tier,
                    TierQuota {
                        tier,
                        seat_quota: entry.seat_quota,
                        exempt_roles: entry.exempt_roles,
                    },
                )
            })
            .collect();
        Self { table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierPolicyEntry;

    #[test]
    fn total_over_known_tiers() {
        let policy = TierQuotaPolicy::default();
        for tier in Tier::ALL {
            assert!(policy.quota_for(tier).is_ok());
        }
    }

    #[test]
    fn deterministic() {
        let policy = TierQuotaPolicy::default();
        assert_eq!(
            policy.quota_for(Tier::Pro).unwrap(),
            policy.quota_for(Tier::Pro).unwrap()
        );
    }

    #[test]
    fn unknown_name_is_error() {
        let policy = TierQuotaPolicy::default();
        let err = policy.quota_for_name("diamond").unwrap_err();
        assert_eq!(err.tier, "diamond");
        assert_eq!(policy.quota_for_name("BASIC").unwrap().seat_quota, 5);
    }

    #[test]
    fn exemption_uses_normalized_roles() {
        let config = PolicyConfig::default()
            .with_tier(Tier::Basic, TierPolicyEntry::new(2, &["Billing", "OWNER"]));
        let policy = TierQuotaPolicy::from_config(&config).unwrap();
        let quota = policy.quota_for(Tier::Basic).unwrap();
        assert_eq!(quota.seat_quota, 2);
        assert!(quota.is_exempt(&Role::new("owner")));
        assert!(quota.is_exempt(&Role::new("billing")));
        assert!(!quota.is_exempt(&Role::new("member")));
    }

    #[test]
    fn incomplete_table_rejected() {
        let mut config = PolicyConfig::default();
        config.tiers.remove(&Tier::Enterprise);
        assert!(TierQuotaPolicy::from_config(&config).is_err());
    }
}
