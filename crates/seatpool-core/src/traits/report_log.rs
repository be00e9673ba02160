//! Persistence for reconciliation reports.

use crate::errors::StoreResult;
use crate::models::{OrgId, ReconcileReport};

pub trait IReconcileLog: Send + Sync {
    fn record_report(&self, report: &ReconcileReport) -> StoreResult<()>;

    /// Most recent reports for an organization, newest first.
    fn recent_reports(&self, org: &OrgId, limit: usize) -> StoreResult<Vec<ReconcileReport>>;
}
