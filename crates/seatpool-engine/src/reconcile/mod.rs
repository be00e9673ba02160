mod control;
mod scanner;
mod snapshot;

pub use control::ScanControl;
pub use scanner::ReconciliationScanner;
