//! Progress events: the stream an analysis run emits while it works.
//!
//! The Observation Extractor and the pipeline publish; whatever drives the
//! workflow (the CLI, a test) subscribes. Nothing in the core depends on a
//! subscriber being present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// One step of an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressKind {
    /// Preconditions passed, the run owns the workflow
    RunStarted { images: usize },

    /// Roster candidates are ready
    RosterExtracted { candidates: usize },

    /// Capture `index` (1-based) is being sent to the oracle
    ImageStarted { index: usize, total: usize },

    /// Capture `index` returned `names` usable names
    ImageExtracted { index: usize, total: usize, names: usize },

    /// Capture `index` failed and contributes no names
    ImageFailed { index: usize, total: usize, reason: String },

    /// The single matching request is in flight
    MatchingStarted { roster: usize, observed: usize },

    /// The oracle's classification was ingested
    MatchingCompleted {
        present: usize,
        absent: usize,
        unexpected: usize,
    },

    /// The run aborted
    RunFailed { reason: String },
}

/// A progress event tagged with its run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

impl ProgressEvent {
    pub fn new(run_id: u64, kind: ProgressKind) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// A one-line, human-readable rendering for terminals and logs.
    pub fn describe(&self) -> String {
        match &self.kind {
            ProgressKind::RunStarted { images } => {
                format!("Starting analysis of {images} capture(s)")
            }
            ProgressKind::RosterExtracted { candidates } => {
                format!("Roster: {candidates} candidate name(s)")
            }
            ProgressKind::ImageStarted { index, total } => {
                format!("Reading capture {index}/{total}...")
            }
            ProgressKind::ImageExtracted { index, total, names } => {
                format!("Capture {index}/{total}: {names} name(s)")
            }
            ProgressKind::ImageFailed { index, total, reason } => {
                format!("Capture {index}/{total} skipped: {reason}")
            }
            ProgressKind::MatchingStarted { roster, observed } => {
                format!("Matching {roster} roster name(s) against {observed} observed name(s)...")
            }
            ProgressKind::MatchingCompleted {
                present,
                absent,
                unexpected,
            } => format!("Matched: {present} present, {absent} absent, {unexpected} unexpected"),
            ProgressKind::RunFailed { reason } => format!("Analysis failed: {reason}"),
        }
    }
}

/// A broadcast-based bus for progress events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Events are
/// delivered in publish order to every subscriber.
pub struct ProgressBus {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl ProgressBus {
    /// Create a new bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Publish a `kind` for `run_id`.
    pub fn emit(&self, run_id: u64, kind: ProgressKind) {
        self.publish(ProgressEvent::new(run_id, kind));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}
