//! The review desk: workflow state machine over the reconciliation engine.

use std::collections::BTreeSet;
use std::fmt;

use rollcall_core::{
    Attendee, BucketCounts, Classification, Error, InputError, Name, Status, WorkflowError,
};
use rollcall_engine::{IngestReport, ReconciliationEngine};
use serde::Serialize;
use tracing::{debug, info};

use crate::pipeline::AnalysisRequest;

/// Where the desk is in the review lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    AnalysisRunning { run_id: u64 },
    PendingReview,
    Finalized,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => f.write_str("idle"),
            WorkflowState::AnalysisRunning { run_id } => write!(f, "analysis run {run_id} in progress"),
            WorkflowState::PendingReview => f.write_str("pending review"),
            WorkflowState::Finalized => f.write_str("finalized"),
        }
    }
}

/// Proof that a run was admitted. Completing or failing a run needs the
/// ticket; a ticket from before the last reset is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    pub run_id: u64,
}

/// The workflow context object.
#[derive(Debug, Default)]
pub struct ReviewDesk {
    engine: ReconciliationEngine,
    state: WorkflowState,
    selection: BTreeSet<Name>,
    staged: Option<Status>,
    generation: u64,
}

impl ReviewDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    fn require(&self, expected: WorkflowState, operation: &'static str) -> Result<(), WorkflowError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorkflowError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    // --- Analysis run ---

    /// Admit a new run. Checks inputs first; no transition on failure.
    ///
    /// Any previous review or result is discarded once the run is admitted.
    pub fn begin_analysis(&mut self, request: &AnalysisRequest) -> Result<RunTicket, Error> {
        if request.roster.is_none() {
            return Err(InputError::MissingRoster.into());
        }
        if request.captures.is_empty() {
            return Err(InputError::NoObservationImages.into());
        }
        if let WorkflowState::AnalysisRunning { .. } = self.state {
            return Err(WorkflowError::RunInProgress.into());
        }

        self.discard_review();
        self.generation += 1;
        let ticket = RunTicket {
            run_id: self.generation,
        };
        self.state = WorkflowState::AnalysisRunning {
            run_id: ticket.run_id,
        };
        info!(run_id = ticket.run_id, captures = request.captures.len(), "Analysis run admitted");
        Ok(ticket)
    }

    fn check_ticket(&self, ticket: RunTicket) -> Result<(), WorkflowError> {
        match self.state {
            WorkflowState::AnalysisRunning { run_id } if run_id == ticket.run_id => Ok(()),
            _ => Err(WorkflowError::StaleRun {
                run_id: ticket.run_id,
            }),
        }
    }

    /// Hand the oracle's raw classification to the engine and open review.
    pub fn complete_analysis(
        &mut self,
        ticket: RunTicket,
        raw: Classification,
    ) -> Result<IngestReport, WorkflowError> {
        self.check_ticket(ticket)?;
        let report = self.engine.ingest(raw);
        self.state = WorkflowState::PendingReview;
        Ok(report)
    }

    /// Return to idle after a failed run. A stale ticket changes nothing.
    pub fn fail_analysis(&mut self, ticket: RunTicket) -> Result<(), WorkflowError> {
        self.check_ticket(ticket)?;
        self.state = WorkflowState::Idle;
        debug!(run_id = ticket.run_id, "Analysis run failed, desk idle");
        Ok(())
    }

    // --- Review ---

    pub fn reject_match(&mut self, index: usize) -> Result<Attendee, WorkflowError> {
        if let WorkflowState::AnalysisRunning { .. } = self.state {
            return Err(WorkflowError::InvalidState {
                operation: "reject_match",
                state: self.state.to_string(),
            });
        }
        self.engine.reject_match(index)
    }

    /// Finalize the review. Only once per review session.
    pub fn finalize(&mut self) -> Result<&Classification, WorkflowError> {
        if let WorkflowState::AnalysisRunning { .. } = self.state {
            return Err(WorkflowError::InvalidState {
                operation: "finalize",
                state: self.state.to_string(),
            });
        }
        let finalized = self.engine.finalize()?;
        self.state = WorkflowState::Finalized;
        Ok(finalized)
    }

    /// Back to idle from any state. A run still in flight is orphaned: its
    /// ticket goes stale and its result is discarded on arrival.
    pub fn reset(&mut self) {
        if let WorkflowState::AnalysisRunning { run_id } = self.state {
            info!(run_id, "Reset while analysis running; result will be discarded");
        }
        self.discard_review();
        self.generation += 1;
        self.state = WorkflowState::Idle;
    }

    fn discard_review(&mut self) {
        self.engine.reset();
        self.selection.clear();
        self.staged = None;
    }

    // --- Selection ---

    fn require_known(&self, name: &Name) -> Result<(), WorkflowError> {
        let known = self
            .engine
            .finalized()
            .is_some_and(|c| c.status_of(name).is_some());
        if known {
            Ok(())
        } else {
            Err(WorkflowError::UnknownName {
                name: name.to_string(),
            })
        }
    }

    /// Flip `name` in the selection. Returns whether it is now selected.
    pub fn toggle_selection(&mut self, name: &Name) -> Result<bool, WorkflowError> {
        self.require(WorkflowState::Finalized, "toggle_selection")?;
        self.require_known(name)?;
        if self.selection.remove(name) {
            Ok(false)
        } else {
            self.selection.insert(name.clone());
            Ok(true)
        }
    }

    /// Add `name`. Returns false if it was already selected.
    pub fn select(&mut self, name: &Name) -> Result<bool, WorkflowError> {
        self.require(WorkflowState::Finalized, "select")?;
        self.require_known(name)?;
        Ok(self.selection.insert(name.clone()))
    }

    /// Remove `name`. Returns false if it was not selected.
    pub fn deselect(&mut self, name: &Name) -> Result<bool, WorkflowError> {
        self.require(WorkflowState::Finalized, "deselect")?;
        Ok(self.selection.remove(name))
    }

    /// Select every attendee visible under `query`. Returns how many were
    /// newly added.
    pub fn select_all_matching(&mut self, query: &str) -> Result<usize, WorkflowError> {
        self.require(WorkflowState::Finalized, "select_all_matching")?;
        let view = self.engine.filtered(query).unwrap_or_default();
        let before = self.selection.len();
        self.selection.extend(view.iter().map(|a| a.name.clone()));
        Ok(self.selection.len() - before)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &BTreeSet<Name> {
        &self.selection
    }

    // --- Bulk reclassification ---

    /// Stage a move of the selection to `target`. Returns the selection size.
    pub fn request_bulk_change(&mut self, target: Status) -> Result<usize, WorkflowError> {
        self.require(WorkflowState::Finalized, "request_bulk_change")?;
        if self.selection.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }
        self.staged = Some(target);
        debug!(%target, selected = self.selection.len(), "Bulk change staged");
        Ok(self.selection.len())
    }

    /// Apply the staged change and clear the selection. Returns how many
    /// attendees moved.
    pub fn confirm_bulk_change(&mut self) -> Result<usize, WorkflowError> {
        self.require(WorkflowState::Finalized, "confirm_bulk_change")?;
        let target = self.staged.ok_or(WorkflowError::NoStagedChange)?;
        let moved = self.engine.bulk_reclassify(&self.selection, target)?;
        self.staged = None;
        self.selection.clear();
        Ok(moved)
    }

    /// Drop the staged change and the selection. Returns whether a change
    /// was staged.
    pub fn cancel_bulk_change(&mut self) -> bool {
        self.selection.clear();
        self.staged.take().is_some()
    }

    pub fn staged_change(&self) -> Option<Status> {
        self.staged
    }

    // --- Views ---

    /// The classification under review, or the finalized one.
    pub fn current(&self) -> Option<&Classification> {
        self.engine.current()
    }

    pub fn finalized(&self) -> Option<&Classification> {
        self.engine.finalized()
    }

    /// Case-insensitive substring search over names and observed forms.
    pub fn filtered(&self, query: &str) -> Option<Classification> {
        self.engine.filtered(query)
    }

    pub fn counts(&self) -> BucketCounts {
        self.engine.counts()
    }

    /// One line for the terminal.
    pub fn summary(&self) -> String {
        let c = self.counts();
        format!(
            "{}: {} present, {} absent, {} unexpected",
            self.state, c.present, c.absent, c.unexpected
        )
    }
}
