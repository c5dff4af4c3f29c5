//! Stage reconciliation for gwcache.
//!
//! Reads the live stage, compiles the patch set, splits it into batches and
//! applies them serially with retry on concurrent-modification conflicts.

pub mod batch;
pub mod reconciler;
pub mod rest_api;
pub mod retry;

pub use reconciler::{ApplyAttempt, ReconcileOutcome, ReconcilePhase, ReconcileReport, StageReconciler};
pub use rest_api::{RestApiLocator, StageUpdate, update_stage};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
