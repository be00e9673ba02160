mod alloc_error;
mod recovery;
mod store_error;

pub use alloc_error::{AllocError, AllocResult, UnknownTierError};
pub use recovery::RecoveryAction;
pub use store_error::{StoreError, StoreResult};
