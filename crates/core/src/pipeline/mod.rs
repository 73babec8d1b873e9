//! Pipeline coordinator: one job from source reference to canonical artifact.
//!
//! A job moves through an explicit state machine:
//!
//! ```text
//! Acquire ──fail──▶ Failed
//!    │
//!  Probe ──unavailable──▶ Encode(Basic)
//!    │
//! Separate ──fail──▶ Encode(Basic)
//!    │
//! Encode(Enhanced) ──fail──▶ Failed
//!    │
//! Finalize ──fail──▶ Failed
//!    │
//!  Done
//! ```
//!
//! Before any of this the identity resolver either skips the job or claims
//! its identity. Separation is best-effort; acquisition, encode and finalize
//! failures end the job. Every intermediate file is tracked by a
//! [`CleanupGuard`](crate::janitor::CleanupGuard) and removed on every exit
//! path, task abort included.

mod config;
mod coordinator;
mod error;
mod state;
mod types;

pub use config::PipelineConfig;
pub use coordinator::PipelineCoordinator;
pub use error::{FinalizeError, PipelineError};
pub use types::{PipelineResult, StageName, StageOutcome, StageStatus};
