//! # Rollcall Oracle
//!
//! The only place Rollcall talks to the matching/extraction model. Two calls:
//!
//! - **Extraction**: one image and an [`ExtractionMode`] in, newline-delimited
//!   names out. Lines are cleaned and length-filtered here.
//! - **Matching**: the full roster and observation lists in one request, a
//!   strictly validated `{present, absent, unexpected}` object out.
//!
//! The model itself is behind [`rollcall_core::Provider`]; this crate owns the
//! prompts, the deterministic request encoding and the response contract.

pub mod adapter;
pub mod prompt;
pub mod response;

pub use adapter::{ExtractionMode, OracleAdapter};
pub use response::{parse_matching_response, parse_name_lines};
