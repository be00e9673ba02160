//! # seatpool-core
//!
//! Foundation crate for the seatpool license allocation engine.
//! Defines the data model, store traits, errors, config, the tier quota
//! policy, and tracing setup. Every other crate in the workspace depends on this.

pub mod config;
pub mod errors;
pub mod models;
pub mod policy;
pub mod tracing;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::SeatPoolConfig;
pub use errors::{AllocError, AllocResult, StoreError, StoreResult, UnknownTierError};
pub use models::{
    AnomalyKind, FlaggedItem, License, LicenseFilter, LicenseId, LicenseStatus, Member, MemberId,
    OrgId, ReconcileReport, ReleaseRecord, Role, Tier,
};
pub use policy::{TierQuota, TierQuotaPolicy};
