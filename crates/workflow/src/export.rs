//! CSV export of a finalized classification.

use std::io::Write;
use std::path::Path;

use rollcall_config::ExportConfig;
use rollcall_core::{Classification, Error, Status};
use tracing::info;

/// Write `name, status, original name` rows, present first, then absent,
/// then unexpected. Each bucket keeps its display order.
pub fn write_csv<W: Write>(
    classification: &Classification,
    config: &ExportConfig,
    writer: W,
) -> Result<usize, Error> {
    let delimiter = config.delimiter_byte().ok_or_else(|| Error::Config {
        message: format!("export delimiter '{}' is not a single ASCII character", config.delimiter),
    })?;

    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    out.write_record(["name", "status", "original_name"])
        .map_err(csv_error)?;

    let mut rows = 0;
    for status in Status::ALL {
        for attendee in classification.bucket(status) {
            let original = attendee
                .original_name
                .as_ref()
                .map(|n| n.as_str())
                .unwrap_or("");
            out.write_record([attendee.name.as_str(), config.label(status), original])
                .map_err(csv_error)?;
            rows += 1;
        }
    }
    out.flush().map_err(|e| Error::Internal(format!("export flush failed: {e}")))?;
    Ok(rows)
}

/// Export to a file, creating or truncating it.
pub fn export_to_path(
    classification: &Classification,
    config: &ExportConfig,
    path: &Path,
) -> Result<usize, Error> {
    let file = std::fs::File::create(path)
        .map_err(|e| Error::Internal(format!("cannot create '{}': {e}", path.display())))?;
    let rows = write_csv(classification, config, file)?;
    info!(path = %path.display(), rows, "Classification exported");
    Ok(rows)
}

fn csv_error(e: csv::Error) -> Error {
    Error::Internal(format!("CSV write failed: {e}"))
}
