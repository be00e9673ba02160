mod engine;
mod retry;
pub(crate) mod staging;

pub use engine::AllocationEngine;
pub(crate) use retry::Abort;
pub use retry::RetryPolicy;
