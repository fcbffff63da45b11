//! Analysis Pipeline
//!
//! ```text
//! RunStateController::trigger ──> Scheduler::run_pass
//!                                   ├─ list_keys("telemetry_*")
//!                                   └─ BatchProcessor::process (per key,
//!                                      sequential or rayon pool)
//!                                        get ─> analyze ─> set "<key>_processed"
//! ```
//!
//! Errors are contained at the narrowest scope: bad records are skipped,
//! bad batches produce a [`BatchOutcome`], and only a failed key listing
//! ends a pass early.

mod batch;
mod scheduler;
mod state;

pub use batch::*;
pub use scheduler::*;
pub use state::*;
