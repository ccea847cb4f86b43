//! Review workflow: the analysis pipeline and the review desk.
//!
//! The [`ReviewDesk`] is the single context object of a reconciliation: the
//! engine, the workflow state, the selection set and any staged bulk change.
//! It is synchronous and enforces the state machine
//!
//! ```text
//! Idle -> AnalysisRunning -> PendingReview -> Finalized
//!   ^____________ reset (from any state) ____________|
//! ```
//!
//! The [`AnalysisPipeline`] drives a run against the oracle, holding the desk
//! behind a `tokio::sync::RwLock` and publishing progress on a
//! [`ProgressBus`](rollcall_core::ProgressBus).

pub mod desk;
pub mod export;
pub mod pipeline;

pub use desk::{ReviewDesk, RunTicket, WorkflowState};
pub use export::{export_to_path, write_csv};
pub use pipeline::{AnalysisPipeline, AnalysisRequest, RunReport};
