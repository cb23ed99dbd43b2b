//! Per-(sample, reference) coverage summaries
//!
//! For every reportable pair, the alignment evidence stored by filter-in
//! is narrowed to the reference with `samtools view`, per-position depth
//! is recomputed over the full reference length (`samtools depth -a`, so
//! uncovered positions appear as depth 0), and the covering reads are
//! exported into a dedicated read archive with `samtools fastq`.

use crate::stages::{run_tool, run_tool_capture};
use crate::{CoverageRecord, ReferenceHit};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const SAMTOOLS: &str = "samtools";

/// Depth statistics over all positions of one reference, zero-depth
/// positions included.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSummary {
    pub average_depth: f64,
    pub min_depth: u64,
    pub max_depth: u64,
    pub breadth_at_2: u64,
    pub breadth_at_20: u64,
}

impl DepthSummary {
    /// Summarize one depth value per reference position. An empty slice
    /// (no positions reported at all) yields an all-zero summary rather
    /// than dividing by zero.
    pub fn from_depths(depths: &[u64]) -> Self {
        if depths.is_empty() {
            return Self {
                average_depth: 0.0,
                min_depth: 0,
                max_depth: 0,
                breadth_at_2: 0,
                breadth_at_20: 0,
            };
        }
        let total: u64 = depths.iter().sum();
        Self {
            average_depth: total as f64 / depths.len() as f64,
            min_depth: *depths.iter().min().unwrap(),
            max_depth: *depths.iter().max().unwrap(),
            breadth_at_2: depths.iter().filter(|&&d| d >= 2).count() as u64,
            breadth_at_20: depths.iter().filter(|&&d| d >= 20).count() as u64,
        }
    }
}

/// Parse `samtools depth` output (CHROM\tPOS\tDEPTH per line) into one
/// depth value per position.
pub fn parse_depth_output(raw: &str) -> Result<Vec<u64>> {
    let mut depths = Vec::new();
    for line in raw.lines() {
        if line.is_empty() {
            continue;
        }
        let depth = line
            .rsplit('\t')
            .next()
            .and_then(|field| field.parse::<u64>().ok())
            .with_context(|| format!("malformed depth line: '{}'", line))?;
        depths.push(depth);
    }
    Ok(depths)
}

pub fn view_args(alignment: &Path, reference_id: &str, subset: &Path, threads: usize) -> Vec<String> {
    vec![
        "view".to_string(),
        "-b".to_string(),
        "-@".to_string(),
        threads.to_string(),
        "-o".to_string(),
        subset.display().to_string(),
        alignment.display().to_string(),
        reference_id.to_string(),
    ]
}

pub fn index_args(alignment: &Path) -> Vec<String> {
    vec!["index".to_string(), alignment.display().to_string()]
}

pub fn depth_args(subset: &Path) -> Vec<String> {
    vec![
        "depth".to_string(),
        "-a".to_string(),
        subset.display().to_string(),
    ]
}

pub fn fastq_args(subset: &Path) -> Vec<String> {
    vec!["fastq".to_string(), subset.display().to_string()]
}

/// Recomputes depth summaries and extracts per-reference read archives
/// from stored alignment evidence.
pub struct CoverageCalculator {
    pub threads: usize,
    pub scratch_dir: PathBuf,
    pub reads_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl CoverageCalculator {
    /// Compute the coverage record for one reportable (sample, reference)
    /// pair from the sample's stored alignment file.
    pub fn record_for(&self, hit: &ReferenceHit, alignment: &Path) -> Result<CoverageRecord> {
        let tag = format!("{}_{}", hit.sample_name, hit.reference_id);
        let subset = self.scratch_dir.join(format!("{}.bam", tag));
        let log = |step: &str| self.logs_dir.join(format!("{}_{}.log", tag, step));

        // Region extraction needs the BAM indexed once per sample.
        let index_path = alignment.with_extension("bam.bai");
        if !index_path.exists() {
            run_tool(SAMTOOLS, &index_args(alignment), &log("index"))?;
        }

        run_tool(
            SAMTOOLS,
            &view_args(alignment, &hit.reference_id, &subset, self.threads),
            &log("view"),
        )?;

        let depth_raw = run_tool_capture(SAMTOOLS, &depth_args(&subset), &log("depth"))?;
        let depths = parse_depth_output(&String::from_utf8_lossy(&depth_raw))?;
        let summary = DepthSummary::from_depths(&depths);

        let reads = run_tool_capture(SAMTOOLS, &fastq_args(&subset), &log("fastq"))?;
        let archive = self.reads_dir.join(format!("{}.fastq", tag));
        fs::write(&archive, reads)
            .with_context(|| format!("cannot write read archive {}", archive.display()))?;

        fs::remove_file(&subset).ok();

        Ok(CoverageRecord {
            sample_name: hit.sample_name.clone(),
            reference_id: hit.reference_id.clone(),
            average_depth: summary.average_depth,
            min_depth: summary.min_depth,
            max_depth: summary.max_depth,
            bases_covered_at_least_twice: summary.breadth_at_2,
            bases_covered_at_least_twenty_times: summary.breadth_at_20,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_summary_single_read() {
        // Reference of length 10; one read covers 5 positions at depth 1.
        let mut depths = vec![1u64; 5];
        depths.extend([0u64; 5]);
        let summary = DepthSummary::from_depths(&depths);
        assert_eq!(summary.average_depth, 0.5);
        assert_eq!(summary.min_depth, 0);
        assert_eq!(summary.max_depth, 1);
        assert_eq!(summary.breadth_at_2, 0);
        assert_eq!(summary.breadth_at_20, 0);
    }

    #[test]
    fn test_depth_summary_no_positions() {
        let summary = DepthSummary::from_depths(&[]);
        assert_eq!(summary.average_depth, 0.0);
        assert_eq!(summary.min_depth, 0);
        assert_eq!(summary.max_depth, 0);
    }

    #[test]
    fn test_depth_summary_breadth_thresholds() {
        let depths = vec![0, 1, 2, 2, 19, 20, 25];
        let summary = DepthSummary::from_depths(&depths);
        assert_eq!(summary.breadth_at_2, 5);
        assert_eq!(summary.breadth_at_20, 2);
        assert_eq!(summary.max_depth, 25);
    }

    #[test]
    fn test_parse_depth_output() {
        let raw = "REF1\t1\t3\nREF1\t2\t0\nREF1\t3\t12\n";
        assert_eq!(parse_depth_output(raw).unwrap(), vec![3, 0, 12]);
    }

    #[test]
    fn test_parse_depth_output_rejects_garbage() {
        assert!(parse_depth_output("REF1\t1\tnot-a-depth\n").is_err());
    }

    #[test]
    fn test_view_args_restrict_to_reference() {
        let args = view_args(
            Path::new("/out/s1/data/reference.bam"),
            "REF1",
            Path::new("/scratch/s1_REF1.bam"),
            4,
        );
        assert_eq!(args[0], "view");
        assert_eq!(args.last().unwrap(), "REF1");
        assert!(args.contains(&"/out/s1/data/reference.bam".to_string()));
    }

    #[test]
    fn test_depth_args_include_zero_positions() {
        let args = depth_args(Path::new("/scratch/s1_REF1.bam"));
        assert_eq!(args, vec!["depth", "-a", "/scratch/s1_REF1.bam"]);
    }
}
