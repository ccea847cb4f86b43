//! End-to-end tests for a reconciliation: roster file and session captures
//! in, reviewed and exported classification out.
//!
//! The oracle is a scripted provider; everything else is the real stack.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rollcall_config::{AppConfig, ImageFailurePolicy};
use rollcall_core::error::ProviderError;
use rollcall_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use rollcall_core::{
    Error, ExtractionError, Message, Name, ProgressKind, Role, Status, WorkflowError,
};
use rollcall_extract::RosterSource;
use rollcall_workflow::{AnalysisPipeline, AnalysisRequest, WorkflowState};
use tokio::sync::Notify;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted replies in sequence and records every request. With a
/// gate, the matching call waits until the gate is opened.
struct ScriptedProvider {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    gate: Option<Arc<Notify>>,
    matching_started: Arc<Notify>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<&str, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .rev()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
            gate: None,
            matching_started: Arc::new(Notify::new()),
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let is_matching = request.messages.first().is_some_and(|m| m.role == Role::System);
        self.requests.lock().unwrap().push(request);

        if is_matching {
            self.matching_started.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted"))?;
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "e2e-model".into(),
        })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

struct Session {
    dir: tempfile::TempDir,
    roster: PathBuf,
    captures: Vec<PathBuf>,
}

impl Session {
    fn new(captures: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let roster = dir.path().join("class.csv");
        std::fs::write(
            &roster,
            "No;Student;Group\n1;Ali Hassan;A\n2;Mona Zaki;A\n3;Omar Farouk;B\n4;Sara Nabil;B\n5;12 345;B\n",
        )
        .unwrap();

        let captures = (1..=captures)
            .map(|i| {
                let path = dir.path().join(format!("gallery-{i}.png"));
                std::fs::write(&path, [0x89, b'P', b'N', b'G', i as u8]).unwrap();
                path
            })
            .collect();

        Self {
            dir,
            roster,
            captures,
        }
    }

    fn request(&self) -> AnalysisRequest {
        AnalysisRequest {
            roster: Some(RosterSource::from_path(&self.roster).unwrap()),
            captures: self.captures.clone(),
        }
    }
}

const CAPTURE_1: &str = "1. Ali-zoom\n2. Mona Zaki\n";
const CAPTURE_2: &str = "- Mona Zaki\n- Guest 7\n- Sarah N\n";
const MATCHING: &str = r#"Here is the result:
{
  "present": [
    {"name": "Mona Zaki", "originalName": "Mona Zaki"},
    {"name": "Ali Hassan", "originalName": "Ali-zoom"},
    {"name": "Sara Nabil", "originalName": "Sarah N"}
  ],
  "absent": ["Omar Farouk"],
  "unexpected": ["Guest 7"]
}"#;

fn pipeline(provider: Arc<ScriptedProvider>, config: &AppConfig) -> AnalysisPipeline {
    AnalysisPipeline::from_config(provider, config)
}

// ── Full flow ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_roster_to_export() {
    let session = Session::new(2);
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(CAPTURE_1),
        Ok(CAPTURE_2),
        Ok(MATCHING),
    ]));
    let config = AppConfig::default();
    let pipeline = pipeline(provider.clone(), &config);

    let report = pipeline.run_analysis(session.request()).await.unwrap();
    assert_eq!(report.roster_candidates, 4);
    assert_eq!(report.observed_names, 4);
    assert_eq!(report.captures_failed, 0);
    assert_eq!(provider.calls(), 3);

    // Two extraction calls carry one image each; the matching call carries none
    assert_eq!(provider.request(0).messages[0].images.len(), 1);
    assert_eq!(provider.request(1).messages[0].images.len(), 1);
    let matching = provider.request(2);
    assert_eq!(matching.temperature, 0.0);
    assert!(matching.messages.iter().all(|m| m.images.is_empty()));
    let payload = &matching.messages[1].content;
    assert!(payload.contains("Omar Farouk"));
    assert!(payload.contains("Ali-zoom"));
    assert!(!payload.contains("12 345"));

    let desk = pipeline.desk();
    {
        let mut desk = desk.write().await;
        assert_eq!(desk.state(), WorkflowState::PendingReview);

        // Buckets arrive sorted
        let c = desk.current().unwrap();
        let present: Vec<&str> = c.present.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(present, vec!["Ali Hassan", "Mona Zaki", "Sara Nabil"]);
        assert!(c.is_consistent());

        // "Sarah N" was a wrong guess
        let rejected = desk.reject_match(2).unwrap();
        assert_eq!(rejected.name, Name::from("Sara Nabil"));
        let c = desk.current().unwrap();
        assert_eq!(c.status_of(&Name::from("Sara Nabil")), Some(Status::Absent));
        assert_eq!(c.status_of(&Name::from("Sarah N")), Some(Status::Unexpected));

        desk.finalize().unwrap();
        assert_eq!(desk.state(), WorkflowState::Finalized);
        assert_eq!(desk.finalize().unwrap_err(), WorkflowError::NoActiveSession);

        // Sarah N attended after all
        desk.select(&Name::from("Sarah N")).unwrap();
        desk.request_bulk_change(Status::Present).unwrap();
        assert_eq!(desk.counts().unexpected, 2);
        assert_eq!(desk.confirm_bulk_change().unwrap(), 1);

        let c = desk.finalized().unwrap();
        assert_eq!(c.status_of(&Name::from("Sarah N")), Some(Status::Present));
        assert!(c.is_sorted());
        assert_eq!(desk.summary(), "finalized: 3 present, 2 absent, 1 unexpected");
    }

    let out = session.dir.path().join("attendance.csv");
    let desk = desk.read().await;
    let rows =
        rollcall_workflow::export_to_path(desk.finalized().unwrap(), &config.export, &out).unwrap();
    assert_eq!(rows, 6);

    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "name,status,original_name");
    assert_eq!(lines[1], "Ali Hassan,Present,Ali-zoom");
    assert_eq!(lines[3], "Sarah N,Present,");
    assert!(lines.contains(&"Guest 7,Unexpected,"));
}

#[tokio::test]
async fn e2e_progress_events_in_order() {
    let session = Session::new(2);
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(CAPTURE_1),
        Err(ProviderError::Timeout("gallery 2".into())),
        Ok(MATCHING),
    ]));
    let pipeline = pipeline(provider, &AppConfig::default());
    let mut rx = pipeline.subscribe();

    let report = pipeline.run_analysis(session.request()).await.unwrap();
    assert_eq!(report.captures_failed, 1);
    assert!(report.warnings[0].contains("timed out"));

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.run_id, report.run_id);
        kinds.push(event.kind.clone());
    }
    assert!(matches!(kinds[0], ProgressKind::RunStarted { images: 2 }));
    assert!(matches!(kinds[1], ProgressKind::RosterExtracted { candidates: 4 }));
    assert!(matches!(kinds[5], ProgressKind::ImageFailed { index: 2, total: 2, .. }));
    assert!(matches!(kinds.last(), Some(ProgressKind::MatchingCompleted { .. })));
}

// ── Failure paths ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_abort_policy_fails_run_and_keeps_nothing() {
    let session = Session::new(2);
    let provider = Arc::new(ScriptedProvider::new(vec![
        Err(ProviderError::Network("connection reset".into())),
    ]));
    let mut config = AppConfig::default();
    config.extraction.image_failure_policy = ImageFailurePolicy::Abort;
    let pipeline = pipeline(provider.clone(), &config);

    let err = pipeline.run_analysis(session.request()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::CaptureFailed { index: 1, total: 2, .. })
    ));
    assert_eq!(provider.calls(), 1);

    let desk = pipeline.desk();
    let desk = desk.read().await;
    assert_eq!(desk.state(), WorkflowState::Idle);
    assert!(desk.current().is_none());
}

#[tokio::test]
async fn e2e_reset_during_matching_discards_result() {
    let session = Session::new(1);
    let gate = Arc::new(Notify::new());
    let provider = Arc::new(
        ScriptedProvider::new(vec![Ok(CAPTURE_1), Ok(MATCHING)]).gated(gate.clone()),
    );
    let started = provider.matching_started.clone();
    let pipeline = Arc::new(pipeline(provider, &AppConfig::default()));

    let run = {
        let pipeline = pipeline.clone();
        let request = session.request();
        tokio::spawn(async move { pipeline.run_analysis(request).await })
    };

    started.notified().await;
    pipeline.desk().write().await.reset();
    gate.notify_one();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Workflow(WorkflowError::StaleRun { run_id: 1 })));

    let desk = pipeline.desk();
    let desk = desk.read().await;
    assert_eq!(desk.state(), WorkflowState::Idle);
    assert!(desk.current().is_none());
}

#[tokio::test]
async fn e2e_second_run_replaces_finalized_result() {
    let session = Session::new(1);
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(CAPTURE_1),
        Ok(MATCHING),
        Ok(CAPTURE_1),
        Ok(r#"{"present": [], "absent": ["Ali Hassan", "Mona Zaki", "Omar Farouk", "Sara Nabil"], "unexpected": []}"#),
    ]));
    let pipeline = pipeline(provider, &AppConfig::default());

    pipeline.run_analysis(session.request()).await.unwrap();
    pipeline.desk().write().await.finalize().unwrap();

    let report = pipeline.run_analysis(session.request()).await.unwrap();
    assert_eq!(report.run_id, 2);

    let desk = pipeline.desk();
    let desk = desk.read().await;
    assert_eq!(desk.state(), WorkflowState::PendingReview);
    assert!(desk.finalized().is_none());
    assert_eq!(desk.counts().absent, 4);
}

#[test]
fn e2e_unsupported_roster_is_rejected_up_front() {
    let session = Session::new(1);
    let notes = session.dir.path().join("notes.docx");
    assert!(RosterSource::from_path(&notes).is_err());
}
