//! Point-in-time view of one organization, taken fresh for every pass.

use std::collections::{BTreeMap, BTreeSet};

use seatpool_core::models::{License, LicenseId, Member, MemberId, OrgId};
use seatpool_core::policy::TierQuota;
use seatpool_core::traits::ISeatStore;
use seatpool_core::StoreResult;

pub(crate) struct Snapshot {
    pub licenses: Vec<License>,
    pub members: Vec<Member>,
}

impl Snapshot {
    /// Both lists come from one store read, so they agree with each other.
    pub fn take(store: &dyn ISeatStore, org: &OrgId) -> StoreResult<Self> {
        let view = store.read_pool(org)?;
        Ok(Self {
            licenses: view.licenses,
            members: view.members,
        })
    }

    pub fn member_ids(&self) -> BTreeSet<MemberId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn license(&self, id: LicenseId) -> Option<&License> {
        self.licenses.iter().find(|l| l.id == id)
    }

    /// ACTIVE assigned licenses grouped by member.
    pub fn seats_by_member(&self) -> BTreeMap<MemberId, Vec<&License>> {
        let mut seats: BTreeMap<MemberId, Vec<&License>> = BTreeMap::new();
        for license in self.licenses.iter().filter(|l| l.is_seat_in_use()) {
            if let Some(member) = license.assigned_member_id {
                seats.entry(member).or_default().push(license);
            }
        }
        seats
    }

    pub fn seats_in_use(&self) -> u32 {
        self.licenses.iter().filter(|l| l.is_seat_in_use()).count() as u32
    }

    pub fn available(&self) -> u32 {
        self.licenses.iter().filter(|l| l.is_available()).count() as u32
    }

    /// Non-exempt members with no seat on either side.
    pub fn awaiting_seat(&self, quota: &TierQuota) -> Vec<MemberId> {
        let seated = self.seats_by_member();
        self.members
            .iter()
            .filter(|m| !quota.is_exempt(&m.role))
            .filter(|m| m.assigned_license_id.is_none() && !seated.contains_key(&m.id))
            .map(|m| m.id)
            .collect()
    }
}

/// Most recently assigned first; ties broken by the higher id.
pub(crate) fn most_recent_first(a: &License, b: &License) -> std::cmp::Ordering {
    (b.assigned_at, b.id).cmp(&(a.assigned_at, a.id))
}
