mod ids;
mod license;
mod member;
mod report;
mod tier;

pub use ids::{LicenseId, MemberId, OrgId};
pub use license::{License, LicenseFilter, LicenseStatus, ReleaseRecord};
pub use member::{normalize_email, Member};
pub use report::{AnomalyKind, AnomalyTally, FlaggedItem, HealFailure, ReconcileReport};
pub use tier::{Role, Tier};
