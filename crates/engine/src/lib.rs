//! # Rollcall Engine
//!
//! Owns the review session (the raw classification awaiting human review)
//! and the finalized classification. Every mutation builds the new buckets
//! off to the side, sorts them, then swaps them in, so no reader ever sees a
//! bucket half-edited. The engine is synchronous; the workflow crate puts it
//! behind a lock.

pub mod engine;

pub use engine::{IngestReport, ReconciliationEngine};
