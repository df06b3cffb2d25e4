//! Output formatting for export outcomes.
//!
//! Provides JSON and plain-text formatters. Terminal styling is left to the
//! caller.

use std::io::Write;

use crate::error::ExportError;
use crate::export::{ExportResponse, ExportSummary, summary_message};

/// Write the JSON envelope for an export outcome.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json(
    result: &Result<ExportSummary, ExportError>,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&ExportResponse::from_result(result))?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Write a plain-text summary of a successful export.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human(summary: &ExportSummary, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(80))?;
    writeln!(writer, "  IMAGES WITHOUT ALT TEXT")?;
    writeln!(writer, "{}", "=".repeat(80))?;
    writeln!(writer)?;
    writeln!(writer, "  Findings:  {}", summary.count)?;
    writeln!(writer, "  Report:    {}", summary.report.path.display())?;
    if let Some(url) = &summary.download_url {
        writeln!(writer, "  Download:  {url}")?;
    }
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(80))?;
    // The envelope message embeds an HTML link; plain text gets the bare sentence.
    writeln!(writer, "{}", summary_message(summary.count, None))?;
    writeln!(writer, "{}", "=".repeat(80))?;
    Ok(())
}
