pub mod batch_ops;
pub mod license_ops;
pub mod member_ops;
pub mod org_ops;
pub mod pool_ops;
pub mod report_ops;
