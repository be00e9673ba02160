//! Read-only lookup from organization to tier (the billing system's view).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{StoreError, StoreResult};
use crate::models::{OrgId, Tier};

/// Organization → tier name. Returns None for an unknown organization.
///
/// Names are raw strings; parsing them against the closed tier set is the
/// policy's job, so a billing system reporting a tier we do not know
/// surfaces as `UnknownTier`.
pub trait ITierSource: Send + Sync {
    fn tier_for(&self, org: &OrgId) -> StoreResult<Option<String>>;
}

/// In-memory tier source for deployments that configure tiers statically.
#[derive(Debug, Default)]
pub struct StaticTierSource {
    tiers: RwLock<HashMap<OrgId, String>>,
}

impl StaticTierSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, org: &OrgId, tier: Tier) -> Self {
        self.set_raw(org, tier.as_str());
        self
    }

    /// Store an arbitrary tier name; used to model a billing system ahead of this deployment.
    pub fn set_raw(&self, org: &OrgId, tier: &str) {
        if let Ok(mut tiers) = self.tiers.write() {
            tiers.insert(org.clone(), tier.to_string());
        }
    }
}

impl ITierSource for StaticTierSource {
    fn tier_for(&self, org: &OrgId) -> StoreResult<Option<String>> {
        let tiers = self.tiers.read().map_err(|e| StoreError::Unavailable {
            reason: format!("tier table lock poisoned: {}", e),
        })?;
        Ok(tiers.get(org).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_lookup() {
        let org = OrgId::new("acme");
        let source = StaticTierSource::new().with(&org, Tier::Pro);
        assert_eq!(source.tier_for(&org).unwrap().as_deref(), Some("pro"));
        assert_eq!(source.tier_for(&OrgId::new("other")).unwrap(), None);
    }

    #[test]
    fn raw_names_pass_through() {
        let org = OrgId::new("acme");
        let source = StaticTierSource::new();
        source.set_raw(&org, "platinum");
        assert_eq!(source.tier_for(&org).unwrap().as_deref(), Some("platinum"));
    }
}
