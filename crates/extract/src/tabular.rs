//! Tabular source reader: spreadsheets and delimited text into a grid of
//! cell strings.

use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use rollcall_core::ExtractionError;

/// Rows of rendered cell strings, every sheet appended in workbook order.
/// Rows may differ in length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cells().all(str::is_empty)
    }
}

/// How a tabular file is read, from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularKind {
    /// xlsx, xlsm, xls, xlsb, ods
    Workbook,
    /// csv, tsv, txt
    Delimited,
}

impl TabularKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(TabularKind::Workbook),
            "csv" | "tsv" | "txt" => Some(TabularKind::Delimited),
            _ => None,
        }
    }
}

/// Read any supported tabular file. Blocking.
pub fn read_grid(path: &Path) -> Result<Grid, ExtractionError> {
    match TabularKind::from_path(path) {
        Some(TabularKind::Workbook) => read_workbook(path),
        Some(TabularKind::Delimited) => read_delimited(path),
        None => Err(tabular_error(path, "unsupported file extension")),
    }
}

fn tabular_error(path: &Path, reason: impl Into<String>) -> ExtractionError {
    ExtractionError::Tabular {
        source_name: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Read every sheet of a workbook.
pub fn read_workbook(path: &Path) -> Result<Grid, ExtractionError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| tabular_error(path, format!("failed to open workbook: {e}")))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(tabular_error(path, "workbook contains no sheets"));
    }

    let mut grid = Grid::default();
    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| tabular_error(path, format!("failed to read sheet '{sheet_name}': {e}")))?;

        grid.rows
            .extend(range.rows().map(|row| row.iter().map(render_cell).collect()));
    }

    tracing::debug!(
        source = %path.display(),
        sheets = sheet_names.len(),
        rows = grid.rows.len(),
        "Workbook read"
    );
    Ok(grid)
}

/// Render one cell as text: whole floats without a fraction, booleans as
/// `TRUE`/`FALSE`, empties as the empty string.
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::Error(e) => format!("#{e:?}"),
    }
}

/// Read a delimited text file, sniffing the delimiter.
pub fn read_delimited(path: &Path) -> Result<Grid, ExtractionError> {
    let content = read_file_as_utf8(path).map_err(|e| tabular_error(path, e))?;
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => sniff_delimiter(&content),
    };
    parse_delimited(&content, delimiter).map_err(|e| tabular_error(path, e))
}

/// Parse headerless, possibly ragged delimited text.
pub fn parse_delimited(content: &str, delimiter: u8) -> Result<Grid, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Grid::default();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        grid.rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

/// Detect the most likely field delimiter by checking consistency across the
/// first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line.
/// The delimiter that produces the most consistent field count (>1 field)
/// wins. A single-column file falls back to comma.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count();
        let score = consistent * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read a file as UTF-8, falling back to Windows-1252 (common for
/// Excel-exported CSVs). A UTF-8 byte-order mark is dropped.
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
