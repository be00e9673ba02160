//! Tier quota table as configured.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{AllocError, AllocResult};
use crate::models::{Role, Tier};

/// Seat quota and exemptions for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicyEntry {
    pub seat_quota: u32,
    #[serde(default)]
    pub exempt_roles: BTreeSet<Role>,
}

impl TierPolicyEntry {
    pub fn new(seat_quota: u32, exempt_roles: &[&str]) -> Self {
        Self {
            seat_quota,
            exempt_roles: exempt_roles.iter().map(Role::new).collect(),
        }
    }
}

/// Quota table keyed by tier. Tiers left out of a config file keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    #[serde(
        deserialize_with = "merge_with_default_tiers",
        serialize_with = "serialize_tiers"
    )]
    pub tiers: BTreeMap<Tier, TierPolicyEntry>,
}

/// Config keys are tier names; entries given in the file replace the default for that tier only.
fn merge_with_default_tiers<'de, D>(d: D) -> Result<BTreeMap<Tier, TierPolicyEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, TierPolicyEntry>::deserialize(d)?;
    let mut tiers = PolicyConfig::default().tiers;
    for (name, entry) in raw {
        let tier: Tier = name.parse().map_err(serde::de::Error::custom)?;
        tiers.insert(tier, entry);
    }
    Ok(tiers)
}

fn serialize_tiers<S>(tiers: &BTreeMap<Tier, TierPolicyEntry>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let raw: BTreeMap<&str, &TierPolicyEntry> =
        tiers.iter().map(|(t, e)| (t.as_str(), e)).collect();
    raw.serialize(s)
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(Tier::Basic, TierPolicyEntry::new(5, &["billing"]));
        tiers.insert(Tier::Pro, TierPolicyEntry::new(25, &["billing"]));
        tiers.insert(Tier::Enterprise, TierPolicyEntry::new(250, &["billing"]));
        Self { tiers }
    }
}

impl PolicyConfig {
    /// Override a single tier's entry.
    pub fn with_tier(mut self, tier: Tier, entry: TierPolicyEntry) -> Self {
        self.tiers.insert(tier, entry);
        self
    }

    /// The table must cover every known tier.
    pub fn validate(&self) -> AllocResult<()> {
        let missing: Vec<&str> = Tier::ALL
            .iter()
            .filter(|t| !self.tiers.contains_key(t))
            .map(|t| t.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AllocError::Config(format!(
                "policy has no entry for tier(s): {}",
                missing.join(", ")
            )))
        }
    }
}
