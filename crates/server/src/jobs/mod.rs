// crates/server/src/jobs/mod.rs
//! Download job system.
//!
//! Provides:
//! - `JobRunner` - the operations exposed to the HTTP layer
//! - `JobStore` - the shared job table
//! - `ProcessSupervisor` - launching and killing the external tool
//! - `JobOrchestrator` - the per-job background task
//! - `progress_stream` - per-client live progress events

pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod runner;
pub mod store;
pub mod stream;
pub mod supervisor;
pub mod types;

pub use error::JobError;
pub use orchestrator::JobOrchestrator;
pub use runner::JobRunner;
pub use store::JobStore;
pub use stream::progress_stream;
pub use supervisor::{ProcessHandle, ProcessSupervisor};
pub use types::{CancelOutcome, JobId, JobSnapshot, JobState, ProgressEvent};
