//! Strongly-typed identifiers.
//!
//! License and member ids are store-assigned and monotonically increasing,
//! so ordering by id is ordering by age.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Organization identifier (opaque, owned by the external directory).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrgId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// License identifier. Lower ids were issued earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseId(pub i64);

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lic-{}", self.0)
    }
}

/// Member identifier. Lower ids were created earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub i64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_age() {
        assert!(LicenseId(1) < LicenseId(2));
        assert!(MemberId(7) > MemberId(3));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(LicenseId(4).to_string(), "lic-4");
        assert_eq!(MemberId(9).to_string(), "mem-9");
        assert_eq!(OrgId::from("acme").to_string(), "acme");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&LicenseId(12)).unwrap();
        assert_eq!(json, "12");
        let org: OrgId = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(org.as_str(), "acme");
    }
}
