use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BranchReport, PipelineOutcome, RunReport};
use crate::taxa::LocateRow;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_outcome(outcome: &PipelineOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    pub fn print_locate(rows: &[LocateRow]) -> io::Result<()> {
        Self::print_json(&rows)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Plain-text rendering for terminals.
pub struct HumanOutput;

impl HumanOutput {
    pub fn print_outcome(outcome: &PipelineOutcome) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        match outcome {
            PipelineOutcome::Stats(reports) => Self::write_stats(&mut stdout, reports),
            PipelineOutcome::Completed(report) => Self::write_summary(&mut stdout, report),
        }
    }

    pub fn print_locate(rows: &[LocateRow]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for row in rows {
            writeln!(stdout, "{}", row.to_tsv())?;
        }
        Ok(())
    }

    pub fn write_stats<W: Write>(writer: &mut W, reports: &[BranchReport]) -> io::Result<()> {
        for report in reports {
            writeln!(writer, "Branch: {}", report.branch)?;
            for (level, count) in &report.stats.levels {
                writeln!(writer, "{level}\t{count}")?;
            }
        }
        Ok(())
    }

    pub fn write_summary<W: Write>(writer: &mut W, report: &RunReport) -> io::Result<()> {
        writeln!(
            writer,
            "Jobs: {} total, {} done, {} skipped, {} not found, {} failed",
            report.total, report.done, report.skipped, report.not_found, report.failed
        )?;
        writeln!(writer, "Elapsed: {:.1}s", report.elapsed_secs)?;
        for failure in &report.failures {
            writeln!(
                writer,
                "{}\t{}\t{}",
                failure.status,
                failure.job.destination_path,
                failure.detail.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}
