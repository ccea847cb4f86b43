//! Interactive review loop over the desk.
//!
//! Reads one command per line from stdin. Every command takes the desk's
//! write lock for its duration only.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use rollcall_config::{AppConfig, ExportConfig};
use rollcall_core::{Attendee, Classification, Error, Name, Status, WorkflowError};
use rollcall_workflow::{ReviewDesk, WorkflowState};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::debug;

const HELP: &str = "\
  Review:
    list                  Show the classification
    reject <n>            Undo present match number <n>
    search <text>         Show names containing <text>
    finalize              Accept the classification
  After finalize:
    select <name>         Add an attendee to the selection
    deselect <name>       Remove an attendee from the selection
    toggle <name>         Flip an attendee's selection
    select-all <text>     Select everyone matching <text>
    clear                 Empty the selection
    mark <status>         Stage a move of the selection (present, absent, unexpected)
    confirm | cancel      Apply or drop the staged move
    export [path]         Write the finalized classification as CSV
  Always:
    reset                 Discard everything and leave
    help | exit
";

/// One line of review input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    Help,
    List,
    /// 1-based, as listed
    Reject(usize),
    Search(String),
    Finalize,
    Select(Name),
    Deselect(Name),
    Toggle(Name),
    SelectAll(String),
    Clear,
    Mark(Status),
    Confirm,
    Cancel,
    Export(Option<PathBuf>),
    Reset,
    Exit,
}

impl FromStr for ReviewCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let needs = |what: &str| format!("'{verb}' needs {what}");
        let name = || {
            if rest.is_empty() {
                Err(needs("a name"))
            } else {
                Ok(Name::new(rest))
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "help" | "?" => Ok(Self::Help),
            "list" | "ls" => Ok(Self::List),
            "reject" => rest
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .map(Self::Reject)
                .ok_or_else(|| needs("a match number from the list")),
            "search" | "find" => Ok(Self::Search(rest.to_string())),
            "finalize" => Ok(Self::Finalize),
            "select" => name().map(Self::Select),
            "deselect" => name().map(Self::Deselect),
            "toggle" => name().map(Self::Toggle),
            "select-all" => Ok(Self::SelectAll(rest.to_string())),
            "clear" => Ok(Self::Clear),
            "mark" => rest.parse::<Status>().map(Self::Mark),
            "confirm" => Ok(Self::Confirm),
            "cancel" => Ok(Self::Cancel),
            "export" => Ok(Self::Export(
                (!rest.is_empty()).then(|| PathBuf::from(rest)),
            )),
            "reset" => Ok(Self::Reset),
            "exit" | "quit" | ":q" => Ok(Self::Exit),
            "" => Err("Empty command".into()),
            other => Err(format!("Unknown command '{other}' (type 'help')")),
        }
    }
}

/// What a command printed and whether the loop ends.
#[derive(Debug, Default)]
pub struct Step {
    pub output: String,
    pub exit: bool,
}

impl Step {
    fn say(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit: false,
        }
    }

    fn leave(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit: true,
        }
    }
}

/// Apply one command to the desk.
pub fn execute(
    desk: &mut ReviewDesk,
    export: &ExportConfig,
    command: ReviewCommand,
) -> Result<Step, Error> {
    let step = match command {
        ReviewCommand::Help => Step::say(HELP),
        ReviewCommand::List => Step::say(match desk.current() {
            Some(c) => render(c, marks(desk)),
            None => "  Nothing to review.\n".into(),
        }),
        ReviewCommand::Reject(n) => {
            let rejected = desk.reject_match(n - 1)?;
            let mut out = format!("  Rejected match {n}: '{}' is now absent.\n", rejected.name);
            if let Some(c) = desk.current() {
                if let Some(seen) = rejected.original_name.filter(|seen| {
                    *seen != rejected.name && c.status_of(seen) == Some(Status::Unexpected)
                }) {
                    let _ = writeln!(out, "  '{seen}' is now unexpected.");
                }
                out.push_str(&render(c, None));
            }
            Step::say(out)
        }
        ReviewCommand::Search(query) => Step::say(match desk.filtered(&query) {
            Some(view) if view.is_empty() => format!("  No names contain '{query}'.\n"),
            Some(view) => match desk.current() {
                Some(full) => render_view(&view, full, marks(desk)),
                None => render(&view, marks(desk)),
            },
            None => "  Nothing to review.\n".into(),
        }),
        ReviewCommand::Finalize => {
            let finalized = desk.finalize()?;
            let out = render(finalized, None);
            Step::say(format!("{out}  Finalized. Select names and 'mark' to reclassify.\n"))
        }
        ReviewCommand::Select(name) => Step::say(if desk.select(&name)? {
            format!("  Selected '{name}' ({} selected).\n", desk.selection().len())
        } else {
            format!("  '{name}' was already selected.\n")
        }),
        ReviewCommand::Deselect(name) => Step::say(if desk.deselect(&name)? {
            format!("  Deselected '{name}' ({} selected).\n", desk.selection().len())
        } else {
            format!("  '{name}' was not selected.\n")
        }),
        ReviewCommand::Toggle(name) => {
            let on = desk.toggle_selection(&name)?;
            Step::say(format!(
                "  '{name}' {} ({} selected).\n",
                if on { "selected" } else { "deselected" },
                desk.selection().len()
            ))
        }
        ReviewCommand::SelectAll(query) => {
            let added = desk.select_all_matching(&query)?;
            Step::say(format!(
                "  Added {added} name(s) ({} selected).\n",
                desk.selection().len()
            ))
        }
        ReviewCommand::Clear => {
            desk.clear_selection();
            Step::say("  Selection cleared.\n")
        }
        ReviewCommand::Mark(target) => {
            let n = desk.request_bulk_change(target)?;
            Step::say(format!(
                "  Move {n} selected name(s) to {target}? Type 'confirm' or 'cancel'.\n"
            ))
        }
        ReviewCommand::Confirm => {
            let moved = desk.confirm_bulk_change()?;
            let mut out = format!("  Moved {moved} name(s).\n");
            if let Some(c) = desk.finalized() {
                out.push_str(&render(c, None));
            }
            Step::say(out)
        }
        ReviewCommand::Cancel => Step::say(if desk.cancel_bulk_change() {
            "  Change cancelled, selection cleared.\n"
        } else {
            "  Nothing staged; selection cleared.\n"
        }),
        ReviewCommand::Export(path) => {
            let finalized = desk.finalized().ok_or(WorkflowError::NotFinalized)?;
            let path = match path {
                Some(path) => path,
                None => default_export_path()?,
            };
            let rows = rollcall_workflow::export_to_path(finalized, export, &path)?;
            Step::say(format!("  Wrote {rows} row(s) to {}\n", path.display()))
        }
        ReviewCommand::Reset => {
            desk.reset();
            Step::leave("  Review discarded.\n")
        }
        ReviewCommand::Exit => Step::leave(match desk.state() {
            WorkflowState::Finalized => "",
            _ => "  Leaving without finalizing.\n",
        }),
    };
    Ok(step)
}

fn marks(desk: &ReviewDesk) -> Option<&BTreeSet<Name>> {
    (desk.state() == WorkflowState::Finalized).then(|| desk.selection())
}

fn default_export_path() -> Result<PathBuf, Error> {
    let dir = AppConfig::reports_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::Internal(format!("cannot create '{}': {e}", dir.display())))?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(dir.join(format!("attendance-{stamp}.csv")))
}

/// Render the three buckets. Present entries are numbered for `reject`;
/// with a selection, selected names are marked `*`.
pub fn render(classification: &Classification, selection: Option<&BTreeSet<Name>>) -> String {
    render_with(classification, selection, |i, _| Some(i + 1))
}

/// Render a filtered view of `full`. Present entries keep their number in
/// the full bucket, so `reject <n>` acts on the attendee shown as `n`.
pub fn render_view(
    view: &Classification,
    full: &Classification,
    selection: Option<&BTreeSet<Name>>,
) -> String {
    render_with(view, selection, |_, attendee| {
        full.present
            .iter()
            .position(|a| a.name == attendee.name)
            .map(|i| i + 1)
    })
}

fn render_with(
    classification: &Classification,
    selection: Option<&BTreeSet<Name>>,
    number_of: impl Fn(usize, &Attendee) -> Option<usize>,
) -> String {
    let mut out = String::new();
    for status in Status::ALL {
        let bucket = classification.bucket(status);
        let _ = writeln!(out, "  {} ({})", title(status), bucket.len());
        for (i, attendee) in bucket.iter().enumerate() {
            let mark = match selection {
                Some(s) if s.contains(&attendee.name) => "*",
                _ => " ",
            };
            let number = match number_of(i, attendee) {
                Some(n) if status == Status::Present => format!("{n:>3}."),
                _ => "    ".to_string(),
            };
            let _ = write!(out, "  {mark}{number} {}", attendee.name);
            if let Some(seen) = attendee
                .original_name
                .as_ref()
                .filter(|seen| **seen != attendee.name)
            {
                let _ = write!(out, "  (seen as \"{seen}\")");
            }
            out.push('\n');
        }
    }
    out
}

fn title(status: Status) -> &'static str {
    match status {
        Status::Present => "Present",
        Status::Absent => "Absent",
        Status::Unexpected => "Unexpected",
    }
}

/// Run the review loop on stdin.
pub async fn run(
    desk: Arc<RwLock<ReviewDesk>>,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  Review the matches below. Type 'help' for commands.");
    println!();
    run_loop(desk, &config.export, BufReader::new(tokio::io::stdin())).await
}

/// The loop proper, over any line source.
pub async fn run_loop<R: AsyncBufRead + Unpin>(
    desk: Arc<RwLock<ReviewDesk>>,
    export: &ExportConfig,
    reader: R,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = reader.lines();

    let opening = execute(&mut *desk.write().await, export, ReviewCommand::List)?;
    print!("{}", opening.output);

    loop {
        print!("  {} > ", desk.read().await.state());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            // EOF (Ctrl+D)
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ReviewCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("  [Error] {e}");
                continue;
            }
        };

        debug!(?command, "Review command");
        match execute(&mut *desk.write().await, export, command) {
            Ok(step) => {
                print!("{}", step.output);
                if step.exit {
                    break;
                }
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }
    Ok(())
}
