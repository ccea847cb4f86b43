//! Roster extraction.
//!
//! A tabular roster is scanned cell by cell with a name heuristic; an image
//! roster is read by the oracle. Either way the result is a de-duplicated
//! set, and an empty set is fatal. There is no fallback from one path to
//! the other.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rollcall_config::ExtractionConfig;
use rollcall_core::{Error, ExtractionError, InputError, Name};
use rollcall_oracle::{ExtractionMode, OracleAdapter};
use tracing::{debug, info};

use crate::image;
use crate::tabular::{self, Grid, TabularKind};

/// Thresholds for the tabular cell heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterRules {
    /// A candidate must be strictly longer than this, in characters
    pub min_cell_chars: usize,
    /// A candidate must have at least this many whitespace-separated tokens
    pub min_tokens: usize,
}

impl Default for RosterRules {
    fn default() -> Self {
        Self {
            min_cell_chars: 5,
            min_tokens: 2,
        }
    }
}

impl From<&ExtractionConfig> for RosterRules {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            min_cell_chars: config.min_roster_cell_chars,
            min_tokens: config.min_roster_tokens,
        }
    }
}

impl RosterRules {
    /// Whether a cell looks like a person's name: non-empty after trimming,
    /// long enough, at least `min_tokens` words, and not a number.
    pub fn is_candidate(&self, cell: &str) -> bool {
        let trimmed = cell.trim();
        !trimmed.is_empty()
            && trimmed.chars().count() > self.min_cell_chars
            && trimmed.split_whitespace().count() >= self.min_tokens
            && !is_numeric(trimmed)
    }
}

/// Whether `s` parses as a number once spaces and thousands separators are
/// removed (`"12 345"`, `"1,234.50"`).
pub fn is_numeric(s: &str) -> bool {
    let compact: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_')
        .collect();
    compact.chars().any(|c| c.is_ascii_digit()) && compact.parse::<f64>().is_ok()
}

/// Collect the candidate names of a grid, de-duplicated.
pub fn extract_from_grid(grid: &Grid, rules: &RosterRules) -> Vec<Name> {
    dedup(
        grid.cells()
            .filter(|cell| rules.is_candidate(cell))
            .map(Name::new),
    )
}

/// De-duplicate by exact (whitespace-normalized) name, keeping first-seen.
pub(crate) fn dedup(names: impl IntoIterator<Item = Name>) -> Vec<Name> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

/// Where the roster comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterSource {
    Tabular(PathBuf),
    Image(PathBuf),
}

impl RosterSource {
    /// Classify a roster file by extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, InputError> {
        let path = path.into();
        if TabularKind::from_path(&path).is_some() {
            Ok(RosterSource::Tabular(path))
        } else if image::is_image_path(&path) {
            Ok(RosterSource::Image(path))
        } else {
            Err(InputError::UnsupportedSource {
                path: path.display().to_string(),
                reason: "expected a spreadsheet (xlsx, xls, ods, csv, tsv, txt) or an image (png, jpg, gif, webp)".into(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            RosterSource::Tabular(p) | RosterSource::Image(p) => p,
        }
    }
}

/// Produces the roster candidate set.
pub struct RosterExtractor {
    adapter: Arc<OracleAdapter>,
    rules: RosterRules,
    max_image_bytes: u64,
}

impl RosterExtractor {
    pub fn new(adapter: Arc<OracleAdapter>, config: &ExtractionConfig) -> Self {
        Self {
            adapter,
            rules: RosterRules::from(config),
            max_image_bytes: config.max_image_bytes,
        }
    }

    /// Extract the roster. Zero candidates is `ExtractionError::NoCandidates`.
    pub async fn extract(&self, source: &RosterSource) -> Result<Vec<Name>, Error> {
        let names = match source {
            RosterSource::Tabular(path) => {
                let path_buf = path.clone();
                let grid = tokio::task::spawn_blocking(move || tabular::read_grid(&path_buf))
                    .await
                    .map_err(|e| Error::Internal(format!("roster reader panicked: {e}")))??;
                debug!(source = %path.display(), rows = grid.rows.len(), "Scanning roster cells");
                extract_from_grid(&grid, &self.rules)
            }
            RosterSource::Image(path) => {
                let payload = image::load_image(path, self.max_image_bytes).await?;
                let names = self
                    .adapter
                    .extract_names(payload, ExtractionMode::Roster)
                    .await?;
                dedup(names)
            }
        };

        if names.is_empty() {
            return Err(ExtractionError::NoCandidates {
                source_name: source.path().display().to_string(),
            }
            .into());
        }

        info!(
            source = %source.path().display(),
            candidates = names.len(),
            "Roster extracted"
        );
        Ok(names)
    }
}
