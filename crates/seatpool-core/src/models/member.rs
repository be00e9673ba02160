//! Member records from the external directory.

use serde::{Deserialize, Serialize};

use super::ids::{LicenseId, MemberId, OrgId};
use super::tier::Role;

/// A team member. The engine only ever writes `assigned_license_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub org_id: OrgId,
    pub email: String,
    pub role: Role,
    pub assigned_license_id: Option<LicenseId>,
    pub version: u64,
}

impl Member {
    /// Identity key used to detect duplicate records.
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Trim and lower-case an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_email_ignores_case_and_whitespace() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
