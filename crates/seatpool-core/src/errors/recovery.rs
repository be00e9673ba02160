//! RecoveryAction enum: what a caller should do with a failed operation.

use std::fmt;

use super::AllocError;

/// Recommended recovery action for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Transient: try the whole operation again later.
    Retry,
    /// Needs a decision outside the engine (config, billing, reconciliation).
    Escalate,
    /// Nothing to do; the request was unnecessary.
    Ignore,
}

impl RecoveryAction {
    /// Determine the recommended recovery action for an AllocError.
    pub fn for_error(error: &AllocError) -> Self {
        match error {
            AllocError::StoreUnavailable { .. } => Self::Retry,
            AllocError::ConcurrentModification { .. } => Self::Retry,

            // Exempt members never need a seat.
            AllocError::MemberExempt { .. } => Self::Ignore,

            AllocError::QuotaExhausted { .. } => Self::Escalate,
            AllocError::LicenseInconsistent { .. } => Self::Escalate,
            AllocError::MemberNotFound { .. } => Self::Escalate,
            AllocError::OrganizationNotFound { .. } => Self::Escalate,
            AllocError::UnknownTier(_) => Self::Escalate,
            AllocError::Storage { .. } => Self::Escalate,
            AllocError::Config(_) => Self::Escalate,
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "Retry"),
            Self::Escalate => write!(f, "Escalate"),
            Self::Ignore => write!(f, "Ignore"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemberId, Role};

    #[test]
    fn transient_errors_retry() {
        let err = AllocError::ConcurrentModification { attempts: 5 };
        assert_eq!(RecoveryAction::for_error(&err), RecoveryAction::Retry);
    }

    #[test]
    fn exempt_is_ignored() {
        let err = AllocError::MemberExempt {
            member: MemberId(1),
            role: Role::new("billing"),
        };
        assert_eq!(RecoveryAction::for_error(&err), RecoveryAction::Ignore);
        assert_eq!(RecoveryAction::Ignore.to_string(), "Ignore");
    }
}
