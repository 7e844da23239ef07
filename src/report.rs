//! Console rendering of a finished run and the process exit decision.

use std::fmt;

use crate::domain::{BatchReport, BatchSummary, TransferResult};

/// Exit status for a finished run: 0 only when every transfer confirmed
pub fn exit_code(report: &BatchReport) -> u8 {
    if report.all_confirmed() { 0 } else { 1 }
}

pub fn render_json(report: &BatchReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Human-readable report, one block per transfer followed by statistics
pub struct TextReport<'a>(pub &'a BatchReport);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Run {}", report.run_id)?;
        writeln!(f)?;

        for result in &report.results {
            write_result(f, result)?;
        }

        match &report.summary {
            BatchSummary::Empty => {
                writeln!(f, "No transfers to process.")?;
                writeln!(f, "Total Time: {:?}", report.wall_clock)?;
            }
            BatchSummary::Completed(stats) => {
                writeln!(f, "Statistics:")?;
                writeln!(f, "   Total Transfers: {}", stats.total)?;
                writeln!(f, "   Confirmed: {}", stats.confirmed)?;
                writeln!(f, "   Failed: {}", stats.failed())?;
                if stats.failed() > 0 {
                    writeln!(f, "      Rejected: {}", stats.rejected)?;
                    writeln!(f, "      Timed Out: {}", stats.timed_out)?;
                    writeln!(f, "      Precursor Failures: {}", stats.precursor_failed)?;
                    writeln!(f, "      Poll Errors: {}", stats.poll_errors)?;
                    writeln!(f, "      Cancelled: {}", stats.cancelled)?;
                }
                writeln!(f, "   Total Time: {:?}", report.wall_clock)?;
                writeln!(f, "   Average Processing Time: {:?}", stats.average_elapsed)?;
                match (stats.min_elapsed, stats.max_elapsed) {
                    (Some(min), Some(max)) => {
                        writeln!(f, "   Min Processing Time: {:?}", min)?;
                        writeln!(f, "   Max Processing Time: {:?}", max)?;
                    }
                    _ => writeln!(f, "   Min/Max Processing Time: n/a (nothing confirmed)")?,
                }
            }
        }
        Ok(())
    }
}

fn write_result(f: &mut fmt::Formatter<'_>, result: &TransferResult) -> fmt::Result {
    let marker = if result.outcome.is_confirmed() { "✅" } else { "❌" };
    writeln!(
        f,
        "{} From: {}",
        marker,
        result.source.as_deref().unwrap_or("<undecoded key>")
    )?;
    writeln!(
        f,
        "   To: {}",
        result.destination.as_deref().unwrap_or("<invalid address>")
    )?;
    writeln!(f, "   Amount: {} lamports", result.amount)?;
    if let Some(signature) = &result.signature {
        writeln!(f, "   Signature: {}", signature)?;
    }
    if !result.outcome.is_confirmed() {
        writeln!(f, "   Error: {}", result.outcome)?;
    }
    writeln!(f, "   Processing Time: {:?}", result.elapsed)?;
    writeln!(f)
}
