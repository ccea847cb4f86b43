//! The analysis pipeline: roster, observations, one matching call, ingest.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rollcall_config::AppConfig;
use rollcall_core::{
    BucketCounts, Classification, Error, ProgressBus, ProgressEvent, ProgressKind, Provider,
};
use rollcall_extract::{ObservationExtractor, RosterExtractor, RosterSource};
use rollcall_oracle::OracleAdapter;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::desk::{ReviewDesk, RunTicket};

/// Inputs of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub roster: Option<RosterSource>,
    /// Session captures, in the order they should be read
    pub captures: Vec<PathBuf>,
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: u64,
    pub roster_candidates: usize,
    pub observed_names: usize,
    pub captures: usize,
    pub captures_failed: usize,
    /// One entry per skipped capture
    pub warnings: Vec<String>,
    /// Names the engine dropped as duplicates on ingest
    pub duplicates_dropped: usize,
    pub counts: BucketCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

struct RunOutput {
    raw: Classification,
    roster_candidates: usize,
    observed_names: usize,
    captures_failed: usize,
    warnings: Vec<String>,
}

/// Drives analysis runs against the oracle and owns the review desk.
pub struct AnalysisPipeline {
    desk: Arc<RwLock<ReviewDesk>>,
    bus: Arc<ProgressBus>,
    adapter: Arc<OracleAdapter>,
    roster: RosterExtractor,
    observations: ObservationExtractor,
}

impl AnalysisPipeline {
    pub fn new(adapter: Arc<OracleAdapter>, config: &AppConfig) -> Self {
        Self {
            desk: Arc::new(RwLock::new(ReviewDesk::new())),
            bus: Arc::new(ProgressBus::default()),
            roster: RosterExtractor::new(adapter.clone(), &config.extraction),
            observations: ObservationExtractor::new(adapter.clone(), &config.extraction),
            adapter,
        }
    }

    /// Build a pipeline over `provider` with every setting from `config`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let adapter = Arc::new(OracleAdapter::from_config(provider, config));
        Self::new(adapter, config)
    }

    pub fn desk(&self) -> Arc<RwLock<ReviewDesk>> {
        self.desk.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.bus.subscribe()
    }

    pub fn adapter(&self) -> &OracleAdapter {
        &self.adapter
    }

    /// Run one analysis to completion.
    ///
    /// The desk lock is held only for state transitions, never across an
    /// oracle call. A second run while one is in flight is rejected; a run
    /// overtaken by a reset is discarded with `StaleRun`. On any failure the
    /// desk returns to idle and no partial classification is kept.
    pub async fn run_analysis(&self, request: AnalysisRequest) -> Result<RunReport, Error> {
        let started_at = Utc::now();
        let ticket = self.desk.write().await.begin_analysis(&request)?;
        let run_id = ticket.run_id;

        self.bus.emit(
            run_id,
            ProgressKind::RunStarted {
                images: request.captures.len(),
            },
        );

        let output = match self.execute(ticket, &request).await {
            Ok(output) => output,
            Err(e) => {
                warn!(run_id, error = %e, "Analysis run failed");
                // A stale ticket means a reset already moved the desk on
                let _ = self.desk.write().await.fail_analysis(ticket);
                self.bus.emit(run_id, ProgressKind::RunFailed { reason: e.to_string() });
                return Err(e);
            }
        };

        let ingest = match self.desk.write().await.complete_analysis(ticket, output.raw) {
            Ok(ingest) => ingest,
            Err(e) => {
                warn!(run_id, error = %e, "Discarding analysis result");
                self.bus.emit(run_id, ProgressKind::RunFailed { reason: e.to_string() });
                return Err(e.into());
            }
        };
        let counts = ingest.counts;

        self.bus.emit(
            run_id,
            ProgressKind::MatchingCompleted {
                present: counts.present,
                absent: counts.absent,
                unexpected: counts.unexpected,
            },
        );

        let report = RunReport {
            run_id,
            roster_candidates: output.roster_candidates,
            observed_names: output.observed_names,
            captures: request.captures.len(),
            captures_failed: output.captures_failed,
            warnings: output.warnings,
            duplicates_dropped: ingest.dropped.len(),
            counts,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            run_id,
            present = counts.present,
            absent = counts.absent,
            unexpected = counts.unexpected,
            warnings = report.warnings.len(),
            "Analysis run complete"
        );
        Ok(report)
    }

    async fn execute(&self, ticket: RunTicket, request: &AnalysisRequest) -> Result<RunOutput, Error> {
        let run_id = ticket.run_id;
        let roster_source = request
            .roster
            .as_ref()
            .ok_or(rollcall_core::InputError::MissingRoster)?;

        let roster = self.roster.extract(roster_source).await?;
        self.bus.emit(
            run_id,
            ProgressKind::RosterExtracted {
                candidates: roster.len(),
            },
        );

        let observed = self
            .observations
            .extract(run_id, &request.captures, &self.bus)
            .await?;
        let captures_failed = request.captures.len() - observed.succeeded;

        self.bus.emit(
            run_id,
            ProgressKind::MatchingStarted {
                roster: roster.len(),
                observed: observed.names.len(),
            },
        );
        let raw = self.adapter.classify(&roster, &observed.names).await?;

        Ok(RunOutput {
            raw,
            roster_candidates: roster.len(),
            observed_names: observed.names.len(),
            captures_failed,
            warnings: observed.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::WorkflowState;
    use rollcall_core::error::ProviderError;
    use rollcall_core::{
        ExtractionError, Message, Name, OracleError, ProviderRequest, ProviderResponse,
        WorkflowError,
    };
    use std::sync::Mutex;

    /// Replies in order, counts calls.
    struct ScriptedProvider {
        replies: Mutex<Vec<Result<&'static str, ProviderError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<&'static str, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let reply = self.replies.lock().unwrap().pop().expect("exhausted")?;
            Ok(ProviderResponse {
                message: Message::assistant(reply),
                usage: None,
                model: "m".into(),
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        request: AnalysisRequest,
    }

    fn fixture(captures: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let roster = dir.path().join("roster.csv");
        std::fs::write(&roster, "No,Name\n1,Ali Hassan\n2,Mona Zaki\n3,Omar Farouk\n").unwrap();
        let captures = (1..=captures)
            .map(|i| {
                let path = dir.path().join(format!("shot{i}.png"));
                std::fs::write(&path, [i as u8]).unwrap();
                path
            })
            .collect();
        Fixture {
            request: AnalysisRequest {
                roster: Some(RosterSource::Tabular(roster)),
                captures,
            },
            _dir: dir,
        }
    }

    const MATCH: &str = r#"{"present": [{"name": "Ali Hassan", "originalName": "Ali-zoom"}, {"name": "Mona Zaki", "originalName": "Mona Zaki"}], "absent": ["Omar Farouk"], "unexpected": ["Guest 7"]}"#;

    #[tokio::test]
    async fn successful_run_opens_review() {
        let provider = ScriptedProvider::new(vec![Ok("Ali-zoom\nMona Zaki"), Ok("Guest 7\nMona Zaki"), Ok(MATCH)]);
        let pipeline = AnalysisPipeline::from_config(provider.clone(), &AppConfig::default());
        let fx = fixture(2);

        let report = pipeline.run_analysis(fx.request.clone()).await.unwrap();
        assert_eq!(report.run_id, 1);
        assert_eq!(report.roster_candidates, 3);
        assert_eq!(report.observed_names, 3);
        assert_eq!(report.captures_failed, 0);
        assert_eq!(report.counts, BucketCounts { present: 2, absent: 1, unexpected: 1 });
        assert_eq!(provider.calls(), 3);

        let desk = pipeline.desk();
        let desk = desk.read().await;
        assert_eq!(desk.state(), WorkflowState::PendingReview);
        assert_eq!(desk.current().unwrap().present[0].name, Name::from("Ali Hassan"));
    }

    #[tokio::test]
    async fn progress_sequence() {
        let provider = ScriptedProvider::new(vec![Ok("Ali-zoom"), Ok(MATCH)]);
        let pipeline = AnalysisPipeline::from_config(provider, &AppConfig::default());
        let mut rx = pipeline.subscribe();
        let fx = fixture(1);

        pipeline.run_analysis(fx.request.clone()).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind.clone());
        }
        assert_eq!(
            kinds,
            vec![
                ProgressKind::RunStarted { images: 1 },
                ProgressKind::RosterExtracted { candidates: 3 },
                ProgressKind::ImageStarted { index: 1, total: 1 },
                ProgressKind::ImageExtracted { index: 1, total: 1, names: 1 },
                ProgressKind::MatchingStarted { roster: 3, observed: 1 },
                ProgressKind::MatchingCompleted { present: 2, absent: 1, unexpected: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn partial_capture_failure_is_reported() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::Timeout("slow".into())),
            Ok("Mona Zaki"),
            Ok(MATCH),
        ]);
        let pipeline = AnalysisPipeline::from_config(provider, &AppConfig::default());
        let fx = fixture(2);

        let report = pipeline.run_analysis(fx.request.clone()).await.unwrap();
        assert_eq!(report.captures_failed, 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn malformed_matching_reply_fails_run() {
        let provider = ScriptedProvider::new(vec![Ok("Ali-zoom"), Ok(r#"{"present": []}"#)]);
        let pipeline = AnalysisPipeline::from_config(provider, &AppConfig::default());
        let mut rx = pipeline.subscribe();
        let fx = fixture(1);

        let err = pipeline.run_analysis(fx.request.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Oracle(OracleError::MalformedResponse(_))));

        let desk = pipeline.desk();
        assert_eq!(desk.read().await.state(), WorkflowState::Idle);
        assert!(desk.read().await.current().is_none());

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event.kind.clone());
        }
        assert!(matches!(last, Some(ProgressKind::RunFailed { .. })));
    }

    #[tokio::test]
    async fn roster_without_candidates_fails_before_oracle() {
        let provider = ScriptedProvider::new(vec![]);
        let pipeline = AnalysisPipeline::from_config(provider.clone(), &AppConfig::default());
        let fx = fixture(1);
        let RosterSource::Tabular(path) = fx.request.roster.clone().unwrap() else {
            unreachable!()
        };
        std::fs::write(&path, "1,2\nAli,Mo\n").unwrap();

        let err = pipeline.run_analysis(fx.request.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::NoCandidates { .. })
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_inputs_are_rejected_without_a_run() {
        let provider = ScriptedProvider::new(vec![]);
        let pipeline = AnalysisPipeline::from_config(provider, &AppConfig::default());
        let mut rx = pipeline.subscribe();

        let err = pipeline.run_analysis(AnalysisRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::Input(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let pipeline = AnalysisPipeline::from_config(ScriptedProvider::new(vec![]), &AppConfig::default());
        let fx = fixture(1);
        // Simulate a run in flight
        pipeline.desk().write().await.begin_analysis(&fx.request).unwrap();

        let err = pipeline.run_analysis(fx.request.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Workflow(WorkflowError::RunInProgress)));
    }

    #[test]
    fn report_serializes() {
        let report = RunReport {
            run_id: 2,
            roster_candidates: 3,
            observed_names: 3,
            captures: 2,
            captures_failed: 1,
            warnings: vec!["Capture 1 of 2 skipped: timeout".into()],
            duplicates_dropped: 0,
            counts: BucketCounts::default(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["captures_failed"], 1);
        assert_eq!(json["warnings"][0], "Capture 1 of 2 skipped: timeout");
    }
}
