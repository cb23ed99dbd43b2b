//! Run-wide evidence tables
//!
//! Three tab-separated tables accumulate across the run: read counts per
//! sample, percent-aligned per (sample, reference), and coverage summaries.
//! Headers are written once at creation; counts/percent rows are appended
//! as each sample completes, coverage rows in a final pass.

use crate::{CoverageRecord, ReferenceHit, SampleCounts};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const COUNTS_FILE: &str = "read_counts.tsv";
pub const PERCENT_FILE: &str = "percent_aligned.tsv";
pub const COVERAGE_FILE: &str = "coverage_summary.tsv";

const COUNTS_HEADER: [&str; 3] = ["SAMPLE", "NBR_READS_TO_ALIGN", "NBR_TOTAL_READS_ALIGNED"];
const PERCENT_HEADER: [&str; 3] = ["SAMPLE", "REFERENCE", "PERCENT_OF_READS_ALIGNED"];
const COVERAGE_HEADER: [&str; 5] = ["SAMPLE", "REFERENCE", "AVERAGE_DEPTH", "MIN_DEPTH", "MAX_DEPTH"];
const COVERAGE_HEADER_EXTENDED: [&str; 2] = [
    "BASES_COVERED_AT_LEAST_TWICE",
    "BASES_COVERED_AT_LEAST_TWENTY_TIMES",
];

/// Percent values carry one decimal of precision; whole percents are
/// written without it (20, not 20.0).
pub fn format_percent(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    }
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<File>> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("cannot create table {}", path.display()))
}

/// Append-only counts/percent/coverage tables for one run.
pub struct EvidenceTables {
    counts: csv::Writer<File>,
    percent: csv::Writer<File>,
    coverage_path: PathBuf,
    extended: bool,
}

impl EvidenceTables {
    /// Create the three tables under `dir` and write their header rows.
    /// With `extended`, the coverage table carries the two breadth-of-
    /// coverage columns.
    pub fn create(dir: &Path, extended: bool) -> Result<Self> {
        let mut counts = tsv_writer(&dir.join(COUNTS_FILE))?;
        counts.write_record(COUNTS_HEADER)?;
        counts.flush()?;

        let mut percent = tsv_writer(&dir.join(PERCENT_FILE))?;
        percent.write_record(PERCENT_HEADER)?;
        percent.flush()?;

        Ok(Self {
            counts,
            percent,
            coverage_path: dir.join(COVERAGE_FILE),
            extended,
        })
    }

    /// Append one sample's counts row and its reportable percent rows.
    /// Rows land in the order given; references below the threshold were
    /// never translated and are absent rather than zero-valued.
    pub fn append_sample(&mut self, counts: &SampleCounts, hits: &[ReferenceHit]) -> Result<()> {
        self.counts.write_record([
            counts.sample_name.clone(),
            counts.reads_to_align.to_string(),
            counts.total_reads_aligned.to_string(),
        ])?;
        self.counts.flush()?;

        for hit in hits {
            self.percent.write_record([
                hit.sample_name.clone(),
                hit.reference_id.clone(),
                format_percent(hit.percent_reads_aligned),
            ])?;
        }
        self.percent.flush()?;
        Ok(())
    }

    /// Write the coverage table in one final pass over all records.
    pub fn write_coverage(&self, records: &[CoverageRecord]) -> Result<()> {
        let mut writer = tsv_writer(&self.coverage_path)?;
        let mut header: Vec<&str> = COVERAGE_HEADER.to_vec();
        if self.extended {
            header.extend(COVERAGE_HEADER_EXTENDED);
        }
        writer.write_record(&header)?;

        for record in records {
            let mut row = vec![
                record.sample_name.clone(),
                record.reference_id.clone(),
                format!("{:.2}", record.average_depth),
                record.min_depth.to_string(),
                record.max_depth.to_string(),
            ];
            if self.extended {
                row.push(record.bases_covered_at_least_twice.to_string());
                row.push(record.bases_covered_at_least_twenty_times.to_string());
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
