//! Filter-in summary translation
//!
//! Converts breseq's machine-readable `summary.json` for one sample into
//! per-reference percent-aligned rows plus the sample's read counters.
//! References at or above the reporting threshold are kept, the rest are
//! absent from the output entirely.

use crate::samples::natural_cmp;
use crate::{ReferenceHit, SampleCounts};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Relevant subset of breseq's `summary.json`.
#[derive(Debug, Deserialize)]
struct BreseqSummary {
    reads: ReadCounts,
    references: ReferenceSection,
}

#[derive(Debug, Deserialize)]
struct ReadCounts {
    total_reads: u64,
    total_aligned_reads: u64,
}

#[derive(Debug, Deserialize)]
struct ReferenceSection {
    reference: HashMap<String, ReferenceEntry>,
}

#[derive(Debug, Deserialize)]
struct ReferenceEntry {
    num_reads_mapped_to_reference: u64,
}

/// Translated evidence for one sample.
#[derive(Debug, Clone)]
pub struct SampleSummary {
    pub counts: SampleCounts,
    pub hits: Vec<ReferenceHit>,
}

/// Round to one decimal place, matching the precision the percent table
/// reports and the threshold compares against.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Translate a raw breseq summary into threshold-filtered reference hits.
///
/// Percent aligned per reference is computed against the sample's total
/// aligned reads, rounded to one decimal, and kept when >= `threshold`
/// (inclusive). Hits are returned in natural alphanumeric reference order.
pub fn translate_summary(
    raw: &str,
    sample_name: &str,
    threshold: f64,
) -> Result<SampleSummary> {
    let summary: BreseqSummary =
        serde_json::from_str(raw).context("malformed filter-in summary JSON")?;
    Ok(translate(summary, sample_name, threshold))
}

/// Read and translate the summary artifact from a filter-in output directory.
pub fn translate_summary_file(
    path: &Path,
    sample_name: &str,
    threshold: f64,
) -> Result<SampleSummary> {
    let file = File::open(path)
        .with_context(|| format!("cannot open filter-in summary {}", path.display()))?;
    let summary: BreseqSummary = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("malformed filter-in summary {}", path.display()))?;
    Ok(translate(summary, sample_name, threshold))
}

fn translate(summary: BreseqSummary, sample_name: &str, threshold: f64) -> SampleSummary {
    let total_aligned = summary.reads.total_aligned_reads;
    let mut hits = Vec::new();
    if total_aligned > 0 {
        for (reference, entry) in &summary.references.reference {
            let percent = round1(
                entry.num_reads_mapped_to_reference as f64 / total_aligned as f64 * 100.0,
            );
            if percent >= threshold {
                hits.push(ReferenceHit {
                    sample_name: sample_name.to_string(),
                    reference_id: reference.clone(),
                    percent_reads_aligned: percent,
                });
            }
        }
    }
    hits.sort_by(|a, b| natural_cmp(&a.reference_id, &b.reference_id));

    SampleSummary {
        counts: SampleCounts {
            sample_name: sample_name.to_string(),
            reads_to_align: summary.reads.total_reads,
            total_reads_aligned: total_aligned,
        },
        hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_json(total: u64, aligned: u64, refs: &[(&str, u64)]) -> String {
        let entries: Vec<String> = refs
            .iter()
            .map(|(name, mapped)| {
                format!("\"{}\": {{\"num_reads_mapped_to_reference\": {}}}", name, mapped)
            })
            .collect();
        format!(
            "{{\"reads\": {{\"total_reads\": {}, \"total_aligned_reads\": {}}}, \
             \"references\": {{\"reference\": {{{}}}}}}}",
            total,
            aligned,
            entries.join(", ")
        )
    }

    #[test]
    fn test_counts_row() {
        let raw = summary_json(200, 100, &[("REF1", 20)]);
        let summary = translate_summary(&raw, "s1", 5.0).unwrap();
        assert_eq!(summary.counts.sample_name, "s1");
        assert_eq!(summary.counts.reads_to_align, 200);
        assert_eq!(summary.counts.total_reads_aligned, 100);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let raw = summary_json(100, 100, &[("REF1", 5), ("REF2", 4)]);
        let summary = translate_summary(&raw, "s1", 5.0).unwrap();
        assert_eq!(summary.hits.len(), 1);
        assert_eq!(summary.hits[0].reference_id, "REF1");
        assert_eq!(summary.hits[0].percent_reads_aligned, 5.0);
    }

    #[test]
    fn test_percent_rounded_to_one_decimal() {
        let raw = summary_json(100, 3, &[("REF1", 1)]);
        let summary = translate_summary(&raw, "s1", 0.0).unwrap();
        assert_eq!(summary.hits[0].percent_reads_aligned, 33.3);
    }

    #[test]
    fn test_rounding_applied_before_threshold() {
        // 2999/10000 = 29.99% rounds to 30.0, which must pass a 30 threshold
        let raw = summary_json(10000, 10000, &[("REF1", 2999)]);
        let summary = translate_summary(&raw, "s1", 30.0).unwrap();
        assert_eq!(summary.hits.len(), 1);
    }

    #[test]
    fn test_references_in_natural_order() {
        let raw = summary_json(100, 100, &[("REF10", 30), ("REF2", 30), ("REF1", 30)]);
        let summary = translate_summary(&raw, "s1", 0.0).unwrap();
        let refs: Vec<&str> = summary.hits.iter().map(|h| h.reference_id.as_str()).collect();
        assert_eq!(refs, vec!["REF1", "REF2", "REF10"]);
    }

    #[test]
    fn test_zero_aligned_reads_yields_no_hits() {
        let raw = summary_json(100, 0, &[("REF1", 0)]);
        let summary = translate_summary(&raw, "s1", 0.0).unwrap();
        assert!(summary.hits.is_empty());
        assert_eq!(summary.counts.total_reads_aligned, 0);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(translate_summary("{\"reads\": {}}", "s1", 0.0).is_err());
    }
}
