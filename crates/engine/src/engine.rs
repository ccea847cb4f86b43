use std::collections::HashSet;

use rollcall_core::{
    Attendee, BucketCounts, Classification, Name, Status, WorkflowError,
};
use tracing::{debug, info, warn};

/// What `ingest` had to clean up in a raw classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Names dropped because they already appeared earlier in the same bucket
    /// or in a higher-priority bucket
    pub dropped: Vec<(Name, Status)>,
    pub counts: BucketCounts,
}

/// The reconciliation engine.
///
/// Holds at most one review session and at most one finalized
/// classification. A session becomes the finalized classification exactly
/// once, through [`finalize`](Self::finalize).
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    session: Option<Classification>,
    finalized: Option<Classification>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a review session from a raw classification.
    ///
    /// Replaces any prior session and drops any finalized classification.
    /// Duplicates are removed: within a bucket the first entry wins, and a
    /// name in several buckets is kept in the first of present, absent,
    /// unexpected. Every attendee's status is set to its bucket, and all
    /// buckets are sorted.
    pub fn ingest(&mut self, raw: Classification) -> IngestReport {
        let mut seen = HashSet::new();
        let mut report = IngestReport::default();
        let mut next = Classification::default();

        for status in Status::ALL {
            for mut attendee in raw.bucket(status).iter().cloned() {
                if !seen.insert(attendee.name.clone()) {
                    warn!(name = %attendee.name, %status, "Dropping duplicate name on ingest");
                    report.dropped.push((attendee.name, status));
                    continue;
                }
                attendee.status = status;
                if status != Status::Present {
                    attendee.original_name = None;
                }
                next.bucket_mut(status).push(attendee);
            }
        }

        next.sort_all();
        report.counts = next.counts();

        info!(
            present = report.counts.present,
            absent = report.counts.absent,
            unexpected = report.counts.unexpected,
            dropped = report.dropped.len(),
            "Review session started"
        );

        self.session = Some(next);
        self.finalized = None;
        report
    }

    /// Undo the oracle's match at `index` in the present bucket.
    ///
    /// The roster name moves to absent and the observed form becomes an
    /// unexpected attendee, unless that exact name is already held by
    /// another attendee. Returns the removed match.
    pub fn reject_match(&mut self, index: usize) -> Result<Attendee, WorkflowError> {
        let session = self.session.as_ref().ok_or(WorkflowError::NoActiveSession)?;
        let len = session.present.len();
        if index >= len {
            return Err(WorkflowError::InvalidIndex { index, len });
        }

        let mut next = session.clone();
        let rejected = next.present.remove(index);

        next.absent.push(Attendee::absent(rejected.name.clone()));
        if let Some(observed) = &rejected.original_name {
            match next.status_of(observed) {
                None => next.unexpected.push(Attendee::unexpected(observed.clone())),
                Some(held_by) => debug!(
                    name = %observed,
                    bucket = %held_by,
                    "Observed form already classified; not added to unexpected"
                ),
            }
        }
        next.sort_bucket(Status::Absent);
        next.sort_bucket(Status::Unexpected);

        info!(name = %rejected.name, index, "Match rejected");
        self.session = Some(next);
        Ok(rejected)
    }

    /// Promote the review session to the finalized classification.
    ///
    /// Consumes the session: a second call without a new `ingest` is
    /// `NoActiveSession`.
    pub fn finalize(&mut self) -> Result<&Classification, WorkflowError> {
        let session = self.session.take().ok_or(WorkflowError::NoActiveSession)?;
        let counts = session.counts();
        info!(
            present = counts.present,
            absent = counts.absent,
            unexpected = counts.unexpected,
            "Classification finalized"
        );
        Ok(self.finalized.insert(session))
    }

    /// Discard the session and the finalized classification.
    pub fn reset(&mut self) {
        if self.session.is_some() || self.finalized.is_some() {
            debug!("Engine state discarded");
        }
        self.session = None;
        self.finalized = None;
    }

    /// Move every finalized attendee whose name is in `selection` into the
    /// `target` bucket. Returns how many moved.
    ///
    /// Names in the selection that match nobody are ignored. Only touched
    /// buckets are re-sorted.
    pub fn bulk_reclassify<'a>(
        &mut self,
        selection: impl IntoIterator<Item = &'a Name>,
        target: Status,
    ) -> Result<usize, WorkflowError> {
        let current = self.finalized.as_ref().ok_or(WorkflowError::NotFinalized)?;
        let selection: HashSet<&Name> = selection.into_iter().collect();

        let mut next = current.clone();
        let mut touched = HashSet::new();
        let mut moving = Vec::new();

        for status in Status::ALL {
            if status == target {
                continue;
            }
            let bucket = next.bucket_mut(status);
            let before = bucket.len();
            let (selected, kept): (Vec<_>, Vec<_>) = std::mem::take(bucket)
                .into_iter()
                .partition(|a| selection.contains(&a.name));
            *bucket = kept;
            if bucket.len() != before {
                touched.insert(status);
            }
            moving.extend(selected);
        }

        let moved = moving.len();
        if moved > 0 {
            touched.insert(target);
            next.bucket_mut(target).extend(moving.into_iter().map(|mut a| {
                a.status = target;
                a
            }));
            for status in touched {
                next.sort_bucket(status);
            }
        }

        info!(%target, moved, "Bulk reclassification applied");
        self.finalized = Some(next);
        Ok(moved)
    }

    /// The active review session, if any.
    pub fn session(&self) -> Option<&Classification> {
        self.session.as_ref()
    }

    /// The finalized classification, if any.
    pub fn finalized(&self) -> Option<&Classification> {
        self.finalized.as_ref()
    }

    /// Whichever classification is current: the session while pending
    /// review, otherwise the finalized one.
    pub fn current(&self) -> Option<&Classification> {
        self.session.as_ref().or(self.finalized.as_ref())
    }

    /// A filtered copy of the current classification (see
    /// [`Classification::filtered`]).
    pub fn filtered(&self, query: &str) -> Option<Classification> {
        self.current().map(|c| c.filtered(query))
    }

    pub fn counts(&self) -> BucketCounts {
        self.current().map(Classification::counts).unwrap_or_default()
    }
}
