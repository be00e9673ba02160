//! # seatpool-engine
//!
//! `AllocationEngine`: AssignSeat / ReleaseSeat / Transfer / member removal,
//! each one staged transaction committed as a single version-checked batch,
//! retried on conflict with jittered backoff.
//!
//! `ReconciliationScanner`: full-pool drift detection and repair through the
//! same staged transactions, producing a `ReconcileReport`.

pub mod allocation;
pub mod reconcile;

pub use allocation::{AllocationEngine, RetryPolicy};
pub use reconcile::{ReconciliationScanner, ScanControl};
