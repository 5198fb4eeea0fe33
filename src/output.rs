//! Output sinks for inspection results

use crate::error::{Error, Result};
use crate::table::TabularResult;
use comfy_table::{ContentArrangement, Table, presets::NOTHING};
use std::io::Write;
use std::path::Path;

/// Render a result as an aligned, borderless grid: one header line plus one
/// line per row. Line breaks inside values are shown as spaces.
pub fn render_table(result: &TabularResult) -> String {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(result.columns().iter().map(|c| flatten(c)));

    for row in result.rows() {
        table.add_row(result.row_cells(row).iter().map(|c| flatten(c)));
    }

    table.to_string()
}

fn flatten(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Write a result to `path` as CSV, truncating any existing file.
///
/// Returns the number of data rows written. On failure the partially
/// written file stays where it is.
pub fn export_csv(result: &TabularResult, path: &Path) -> Result<usize> {
    let csv_err = |source| Error::Export {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(result.columns()).map_err(csv_err)?;

    for row in result.rows() {
        writer.write_record(result.row_cells(row)).map_err(csv_err)?;
    }

    writer.flush().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), rows = result.len(), "CSV export written");
    Ok(result.len())
}

/// Operator notification channel
pub trait Announcer {
    /// Something completed successfully
    fn success(&mut self, message: &str);
    /// The inspection ran and found nothing
    fn empty(&mut self, message: &str);
    /// Non-fatal problem
    fn warning(&mut self, message: &str);
    /// The current command failed
    fn error(&mut self, message: &str);
    /// Rendered output, printed as-is
    fn print(&mut self, text: &str);
}

/// Terminal announcer: output and successes to `out`, problems to `err`
#[derive(Debug)]
pub struct Console<O: Write, E: Write> {
    out: O,
    err: E,
}

impl Console<std::io::Stdout, std::io::Stderr> {
    /// Console bound to the process stdout/stderr
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> Console<O, E> {
    /// Console over arbitrary writers
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Recover the underlying writers
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

// A broken terminal is not something an operator can be told about.
impl<O: Write, E: Write> Announcer for Console<O, E> {
    fn success(&mut self, message: &str) {
        let _ = writeln!(self.out, "Success: {}", message);
    }

    fn empty(&mut self, message: &str) {
        let _ = writeln!(self.out, "Success: {}", message);
    }

    fn warning(&mut self, message: &str) {
        let _ = writeln!(self.err, "Warning: {}", message);
    }

    fn error(&mut self, message: &str) {
        let _ = writeln!(self.err, "Error: {}", message);
    }

    fn print(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }
}
