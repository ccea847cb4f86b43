//! Rollcall CLI: the main entry point.
//!
//! Commands:
//! - `analyze`   Extract, match and review one session
//! - `config`    Show, validate or locate the configuration
//! - `status`    Show the effective settings
//! - `doctor`    Diagnose setup problems
//! - `onboard`   Create the config directory and a default config
//! - `providers` List supported oracle backends

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rollcall",
    about = "Rollcall: reconcile a class roster against a live session",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a roster against session captures
    Analyze {
        /// Roster file: spreadsheet (xlsx, xls, ods, csv, tsv) or image
        #[arg(short, long)]
        roster: PathBuf,

        /// Session capture image; repeat for several, in order
        #[arg(short, long = "capture", required = true)]
        captures: Vec<PathBuf>,

        /// Review matches interactively before finalizing. Without this flag
        /// the oracle's matches are accepted as-is and finalized directly
        #[arg(long)]
        review: bool,

        /// Write the finalized classification to this CSV file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show the effective settings
    Status,

    /// Diagnose setup problems
    Doctor,

    /// Initialize configuration
    Onboard,

    /// List supported oracle providers
    Providers,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API keys redacted)
    Show,
    /// Check the configuration for problems
    Validate,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Analyze {
            roster,
            captures,
            review,
            out,
        } => commands::analyze::run(roster, captures, review, out).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Providers => commands::providers::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn review_flag_help_warns_about_skipping_review() {
        let cli = Cli::command();
        let analyze = cli.find_subcommand("analyze").unwrap();
        let review = analyze
            .get_arguments()
            .find(|a| a.get_id() == "review")
            .unwrap();
        let help = review.get_long_help().or(review.get_help()).unwrap().to_string();
        assert!(help.contains("accepted as-is"));
    }

    #[test]
    fn analyze_requires_a_capture() {
        assert!(Cli::try_parse_from(["rollcall", "analyze", "--roster", "class.csv"]).is_err());
        assert!(
            Cli::try_parse_from([
                "rollcall", "analyze", "--roster", "class.csv", "--capture", "a.png"
            ])
            .is_ok()
        );
    }
}
