//! `rollcall analyze`: run the pipeline, then review or finalize.

use std::path::PathBuf;

use rollcall_config::AppConfig;
use rollcall_core::ProgressEvent;
use rollcall_extract::RosterSource;
use rollcall_workflow::{AnalysisPipeline, AnalysisRequest, RunReport};
use tokio::sync::broadcast;

use super::review;

pub async fn run(
    roster: PathBuf,
    captures: Vec<PathBuf>,
    interactive: bool,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early, give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    ROLLCALL_API_KEY      (generic)");
        eprintln!("    OPENROUTER_API_KEY    (recommended)");
        eprintln!("    OPENAI_API_KEY / ANTHROPIC_API_KEY");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let request = AnalysisRequest {
        roster: Some(RosterSource::from_path(roster)?),
        captures,
    };

    let router = rollcall_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;
    let pipeline = AnalysisPipeline::from_config(provider, &config);

    eprintln!(
        "  Provider: {}  Model: {}",
        pipeline.adapter().provider_name(),
        pipeline.adapter().model()
    );
    let report = run_with_progress(&pipeline, request).await?;
    print_report(&report);

    let desk = pipeline.desk();
    if interactive {
        review::run(desk.clone(), &config).await?;
    } else {
        let mut desk = desk.write().await;
        let finalized = desk.finalize()?;
        println!();
        println!("  Finalized without review; oracle matches accepted as-is.");
        print!("{}", review::render(finalized, None));
    }

    if let Some(path) = out {
        let desk = desk.read().await;
        match desk.finalized() {
            Some(finalized) => {
                let rows = rollcall_workflow::export_to_path(finalized, &config.export, &path)?;
                println!("  Wrote {rows} row(s) to {}", path.display());
            }
            None => eprintln!("  Review was not finalized; nothing written to {}", path.display()),
        }
    }

    Ok(())
}

/// Drive the run while printing its progress events as they arrive.
pub async fn run_with_progress(
    pipeline: &AnalysisPipeline,
    request: AnalysisRequest,
) -> Result<RunReport, rollcall_core::Error> {
    let mut rx = pipeline.subscribe();
    let run = pipeline.run_analysis(request);
    tokio::pin!(run);

    let result = loop {
        tokio::select! {
            event = rx.recv() => print_event(event),
            result = &mut run => break result,
        }
    };
    while let Ok(event) = rx.try_recv() {
        eprintln!("  {}", event.describe());
    }
    result
}

fn print_event(event: Result<std::sync::Arc<ProgressEvent>, broadcast::error::RecvError>) {
    match event {
        Ok(event) => eprintln!("  {}", event.describe()),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            eprintln!("  ({n} progress event(s) skipped)")
        }
        Err(broadcast::error::RecvError::Closed) => {}
    }
}

fn print_report(report: &RunReport) {
    let elapsed = report.finished_at - report.started_at;
    eprintln!();
    eprintln!(
        "  Run {} finished in {:.1}s: {} roster candidate(s), {} observed name(s) from {} capture(s)",
        report.run_id,
        elapsed.num_milliseconds() as f64 / 1000.0,
        report.roster_candidates,
        report.observed_names,
        report.captures
    );
    if report.captures_failed > 0 {
        eprintln!("  {} capture(s) could not be read:", report.captures_failed);
        for warning in &report.warnings {
            eprintln!("    - {warning}");
        }
    }
    if report.duplicates_dropped > 0 {
        eprintln!(
            "  {} duplicate name(s) in the oracle reply were dropped",
            report.duplicates_dropped
        );
    }
}
