//! # Rollcall Core
//!
//! Domain types, traits, and error definitions for Rollcall, which reconciles
//! an authoritative roster against the names observed in a live session.
//! This crate has **no I/O**. It defines the model that every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! The oracle backend is a trait here ([`Provider`]); implementations live in
//! `rollcall-providers`. This enables:
//! - Swapping backends via configuration
//! - Testing the whole pipeline with scripted providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod attendee;
pub mod collation;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use attendee::{Attendee, BucketCounts, Classification, Name, Status};
pub use error::{
    Error, ExtractionError, InputError, OracleError, ProviderError, Result, WorkflowError,
};
pub use event::{ProgressBus, ProgressEvent, ProgressKind};
pub use message::{ImagePayload, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
