//! Allocation engine errors (the only errors the public API returns).

use crate::models::{LicenseId, MemberId, OrgId, Role};

use super::StoreError;

/// Tier name outside the closed tier set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier: {tier}")]
pub struct UnknownTierError {
    pub tier: String,
}

/// Errors surfaced by allocation and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error(transparent)]
    UnknownTier(#[from] UnknownTierError),

    #[error("organization not found: {org}")]
    OrganizationNotFound { org: OrgId },

    #[error("member {member} not found in organization {org}")]
    MemberNotFound { org: OrgId, member: MemberId },

    #[error("member {member} has exempt role '{role}' and does not need a seat")]
    MemberExempt { member: MemberId, role: Role },

    #[error("no seat available in {org}: {assigned}/{seat_quota} in use")]
    QuotaExhausted {
        org: OrgId,
        assigned: u32,
        seat_quota: u32,
    },

    #[error("license {license:?} inconsistent with member {member}: {detail}")]
    LicenseInconsistent {
        member: MemberId,
        license: Option<LicenseId>,
        detail: String,
    },

    #[error("concurrent modification: gave up after {attempts} attempts")]
    ConcurrentModification { attempts: u32 },

    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for AllocError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable { reason } => Self::StoreUnavailable { reason },
            // Conflicts are retried by the engine; one that escapes is a lost race.
            StoreError::Conflict { .. } => Self::ConcurrentModification { attempts: 1 },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

pub type AllocResult<T> = Result<T, AllocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_maps_to_store_unavailable() {
        let err: AllocError = StoreError::Unavailable {
            reason: "timeout".into(),
        }
        .into();
        assert_eq!(
            err,
            AllocError::StoreUnavailable {
                reason: "timeout".into()
            }
        );
    }

    #[test]
    fn other_store_errors_map_to_storage() {
        let err: AllocError = StoreError::Corrupt {
            details: "bad status".into(),
        }
        .into();
        assert!(matches!(err, AllocError::Storage { .. }));
    }

    #[test]
    fn messages_name_the_subject() {
        let err = AllocError::QuotaExhausted {
            org: OrgId::new("acme"),
            assigned: 2,
            seat_quota: 2,
        };
        assert_eq!(err.to_string(), "no seat available in acme: 2/2 in use");
        let err: AllocError = UnknownTierError {
            tier: "gold".into(),
        }
        .into();
        assert_eq!(err.to_string(), "unknown tier: gold");
    }
}
