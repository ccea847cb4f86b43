//! # Rollcall Extract
//!
//! Turns raw inputs into candidate name sets:
//!
//! - [`roster`]: the authoritative list, from a spreadsheet or delimited file
//!   (cell heuristics) or from an image (oracle extraction).
//! - [`observation`]: the names seen in the session, from an ordered series of
//!   captures, one oracle call at a time with progress events.
//!
//! [`tabular`] and [`image`] are the file readers both build on.

pub mod image;
pub mod observation;
pub mod roster;
pub mod tabular;

pub use observation::{ObservationExtractor, ObservationOutcome};
pub use roster::{RosterExtractor, RosterRules, RosterSource};
pub use tabular::Grid;
