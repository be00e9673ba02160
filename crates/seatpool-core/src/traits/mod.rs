mod admin;
mod report_log;
mod seat_store;
mod tier_source;

pub use admin::ISeatAdmin;
pub use report_log::IReconcileLog;
pub use seat_store::{
    BatchGuard, ILicensePool, IMemberDirectory, ISeatStore, PoolView, WriteBatch, WriteOp,
};
pub use tier_source::{ITierSource, StaticTierSource};
