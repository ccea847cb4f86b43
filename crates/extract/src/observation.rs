//! Observation extraction: names seen across a series of session captures.
//!
//! Captures are processed strictly in input order, one oracle round-trip at
//! a time, so progress events arrive in a stable sequence. A capture that
//! cannot be read contributes no names; whether that is a warning or aborts
//! the run is the configured [`ImageFailurePolicy`].

use std::path::PathBuf;
use std::sync::Arc;

use rollcall_config::{ExtractionConfig, ImageFailurePolicy};
use rollcall_core::{Error, ExtractionError, ImagePayload, Name, ProgressBus, ProgressKind};
use rollcall_oracle::{ExtractionMode, OracleAdapter};
use tracing::{info, warn};

use crate::image;
use crate::roster::dedup;

/// Result of extracting every capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationOutcome {
    /// Union of all captures' names, de-duplicated by exact string
    pub names: Vec<Name>,
    /// One line per capture that failed and was skipped
    pub warnings: Vec<String>,
    /// Number of captures that yielded a result (possibly empty)
    pub succeeded: usize,
}

/// Produces the observation name set.
pub struct ObservationExtractor {
    adapter: Arc<OracleAdapter>,
    policy: ImageFailurePolicy,
    max_image_bytes: u64,
}

impl ObservationExtractor {
    pub fn new(adapter: Arc<OracleAdapter>, config: &ExtractionConfig) -> Self {
        Self {
            adapter,
            policy: config.image_failure_policy,
            max_image_bytes: config.max_image_bytes,
        }
    }

    pub fn with_policy(mut self, policy: ImageFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load and extract each capture file in order.
    pub async fn extract(
        &self,
        run_id: u64,
        captures: &[PathBuf],
        bus: &ProgressBus,
    ) -> Result<ObservationOutcome, Error> {
        let total = captures.len();
        let mut per_image = Vec::with_capacity(total);

        for (i, path) in captures.iter().enumerate() {
            let index = i + 1;
            bus.emit(run_id, ProgressKind::ImageStarted { index, total });

            let result = match image::load_image(path, self.max_image_bytes).await {
                Ok(payload) => self.read_one(payload).await,
                Err(e) => Err(e.to_string()),
            };
            per_image.push(self.settle(run_id, index, total, result, bus)?);
        }

        Ok(self.finish(per_image))
    }

    /// Extract captures that are already in memory.
    pub async fn extract_payloads(
        &self,
        run_id: u64,
        captures: Vec<ImagePayload>,
        bus: &ProgressBus,
    ) -> Result<ObservationOutcome, Error> {
        let total = captures.len();
        let mut per_image = Vec::with_capacity(total);

        for (i, payload) in captures.into_iter().enumerate() {
            let index = i + 1;
            bus.emit(run_id, ProgressKind::ImageStarted { index, total });
            let result = self.read_one(payload).await;
            per_image.push(self.settle(run_id, index, total, result, bus)?);
        }

        Ok(self.finish(per_image))
    }

    async fn read_one(&self, payload: ImagePayload) -> Result<Vec<Name>, String> {
        self.adapter
            .extract_names(payload, ExtractionMode::Observation)
            .await
            .map_err(|e| e.to_string())
    }

    /// Publish the outcome of one capture and apply the failure policy.
    fn settle(
        &self,
        run_id: u64,
        index: usize,
        total: usize,
        result: Result<Vec<Name>, String>,
        bus: &ProgressBus,
    ) -> Result<Result<Vec<Name>, String>, Error> {
        match result {
            Ok(names) => {
                bus.emit(
                    run_id,
                    ProgressKind::ImageExtracted {
                        index,
                        total,
                        names: names.len(),
                    },
                );
                Ok(Ok(names))
            }
            Err(reason) => {
                warn!(run_id, index, total, %reason, "Capture extraction failed");
                bus.emit(
                    run_id,
                    ProgressKind::ImageFailed {
                        index,
                        total,
                        reason: reason.clone(),
                    },
                );
                match self.policy {
                    ImageFailurePolicy::Warn => Ok(Err(reason)),
                    ImageFailurePolicy::Abort => Err(ExtractionError::CaptureFailed {
                        index,
                        total,
                        reason,
                    }
                    .into()),
                }
            }
        }
    }

    fn finish(&self, per_image: Vec<Result<Vec<Name>, String>>) -> ObservationOutcome {
        let total = per_image.len();
        let mut outcome = ObservationOutcome::default();
        let mut all = Vec::new();

        for (i, result) in per_image.into_iter().enumerate() {
            match result {
                Ok(names) => {
                    outcome.succeeded += 1;
                    all.extend(names);
                }
                Err(reason) => outcome
                    .warnings
                    .push(format!("Capture {} of {total} skipped: {reason}", i + 1)),
            }
        }

        outcome.names = dedup(all);
        info!(
            captures = total,
            succeeded = outcome.succeeded,
            names = outcome.names.len(),
            "Observations extracted"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::error::ProviderError;
    use rollcall_core::{Message, ProgressEvent, Provider, ProviderRequest, ProviderResponse};
    use std::sync::Mutex;

    /// Replies in order; an `Err` entry simulates a failed round-trip.
    struct ScriptedProvider {
        replies: Mutex<Vec<Result<&'static str, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn adapter(replies: Vec<Result<&'static str, ProviderError>>) -> Arc<OracleAdapter> {
            let provider = Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
            });
            Arc::new(OracleAdapter::new(provider, "m"))
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let reply = self.replies.lock().unwrap().pop().expect("exhausted")?;
            Ok(ProviderResponse {
                message: Message::assistant(reply),
                usage: None,
                model: "m".into(),
            })
        }
    }

    fn payloads(n: usize) -> Vec<ImagePayload> {
        (1..=n)
            .map(|i| ImagePayload::new(format!("shot{i}.png"), "image/png", vec![i as u8]))
            .collect()
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Arc<ProgressEvent>>) -> Vec<ProgressKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind.clone());
        }
        kinds
    }

    #[tokio::test]
    async fn unions_and_dedups_across_captures() {
        let adapter = ScriptedProvider::adapter(vec![
            Ok("Ali Hassan\nMona Zaki"),
            Ok("Mona Zaki\nGuest 7\nAli Hassan"),
        ]);
        let extractor = ObservationExtractor::new(adapter, &ExtractionConfig::default());
        let bus = ProgressBus::default();

        let outcome = extractor.extract_payloads(1, payloads(2), &bus).await.unwrap();
        assert_eq!(
            outcome.names,
            vec![
                Name::from("Ali Hassan"),
                Name::from("Mona Zaki"),
                Name::from("Guest 7")
            ]
        );
        assert_eq!(outcome.succeeded, 2);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn progress_is_in_input_order() {
        let adapter = ScriptedProvider::adapter(vec![
            Ok("Ali Hassan"),
            Err(ProviderError::Timeout("slow".into())),
            Ok(""),
        ]);
        let extractor = ObservationExtractor::new(adapter, &ExtractionConfig::default());
        let bus = ProgressBus::default();
        let mut rx = bus.subscribe();

        extractor.extract_payloads(4, payloads(3), &bus).await.unwrap();

        let kinds = drain(&mut rx);
        assert_eq!(kinds.len(), 6);
        assert_eq!(kinds[0], ProgressKind::ImageStarted { index: 1, total: 3 });
        assert_eq!(kinds[1], ProgressKind::ImageExtracted { index: 1, total: 3, names: 1 });
        assert_eq!(kinds[2], ProgressKind::ImageStarted { index: 2, total: 3 });
        assert!(matches!(kinds[3], ProgressKind::ImageFailed { index: 2, total: 3, .. }));
        assert_eq!(kinds[4], ProgressKind::ImageStarted { index: 3, total: 3 });
        assert_eq!(kinds[5], ProgressKind::ImageExtracted { index: 3, total: 3, names: 0 });
    }

    #[tokio::test]
    async fn failed_capture_degrades_to_warning() {
        let adapter = ScriptedProvider::adapter(vec![
            Err(ProviderError::Network("reset".into())),
            Ok("Mona Zaki"),
        ]);
        let extractor = ObservationExtractor::new(adapter, &ExtractionConfig::default());

        let outcome = extractor
            .extract_payloads(1, payloads(2), &ProgressBus::default())
            .await
            .unwrap();
        assert_eq!(outcome.names, vec![Name::from("Mona Zaki")]);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("Capture 1 of 2 skipped"));
    }

    #[tokio::test]
    async fn abort_policy_stops_at_first_failure() {
        let adapter = ScriptedProvider::adapter(vec![
            Ok("Ali Hassan"),
            Err(ProviderError::Network("reset".into())),
            Ok("Mona Zaki"),
        ]);
        let extractor = ObservationExtractor::new(adapter, &ExtractionConfig::default())
            .with_policy(ImageFailurePolicy::Abort);
        let bus = ProgressBus::default();
        let mut rx = bus.subscribe();

        let err = extractor.extract_payloads(1, payloads(3), &bus).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::CaptureFailed { index: 2, total: 3, .. })
        ));
        // The third capture was never started
        assert_eq!(drain(&mut rx).len(), 4);
    }

    #[tokio::test]
    async fn unreadable_file_is_a_capture_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("shot1.png");
        std::fs::write(&good, [1, 2, 3]).unwrap();
        let missing = dir.path().join("shot2.png");

        let adapter = ScriptedProvider::adapter(vec![Ok("Ali Hassan")]);
        let extractor = ObservationExtractor::new(adapter, &ExtractionConfig::default());

        let outcome = extractor
            .extract(1, &[good, missing], &ProgressBus::default())
            .await
            .unwrap();
        assert_eq!(outcome.names, vec![Name::from("Ali Hassan")]);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("shot2.png"));
    }
}
