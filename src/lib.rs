//! ViroScan
//!
//! Sample-batch analysis pipeline for shotgun sequencing reads.
//!
//! This library provides the orchestration and aggregation layer for:
//! - Sample discovery and grouping from raw read directories
//! - Optional host read removal against a background reference (filter-out)
//! - Candidate-reference quantification with breseq (filter-in)
//! - Cross-sample evidence tables and coverage summaries

pub mod config;
pub mod coverage;
pub mod pipeline;
pub mod samples;
pub mod stages;
pub mod summary;
pub mod tables;

use serde::{Deserialize, Serialize};

/// One (sample, reference) observation that passed the reporting threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceHit {
    pub sample_name: String,
    pub reference_id: String,
    pub percent_reads_aligned: f64,
}

/// Per-sample read counters from the filter-in summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleCounts {
    pub sample_name: String,
    pub reads_to_align: u64,
    pub total_reads_aligned: u64,
}

/// Depth summary for one reportable (sample, reference) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub sample_name: String,
    pub reference_id: String,
    pub average_depth: f64,
    pub min_depth: u64,
    pub max_depth: u64,
    pub bases_covered_at_least_twice: u64,
    pub bases_covered_at_least_twenty_times: u64,
}
