//! Pipeline orchestration
//!
//! Drives one whole run: discover samples, run the per-sample stages in
//! natural alphanumeric order, feed each filter-in summary into the
//! evidence tables, then compute coverage records for every reportable
//! (sample, reference) pair. Processing is strictly sequential and fails
//! fast: the first stage error aborts the run, leaving partial tables in
//! place for inspection.

use crate::config::RunConfig;
use crate::coverage::CoverageCalculator;
use crate::samples::{discover_samples, Sample};
use crate::stages::{
    plan_filter_in, plan_filter_out, run_tool, sample_inputs, Stage, BOWTIE2, BRESEQ,
};
use crate::summary::translate_summary_file;
use crate::tables::EvidenceTables;
use crate::ReferenceHit;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-sample progression. Filter-out is skipped when no background
/// index is configured; everything else is unconditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleState {
    Discovered,
    FilterOut,
    FilterIn,
    Reported,
    Done,
}

impl SampleState {
    pub fn next(self, filter_out_enabled: bool) -> SampleState {
        match self {
            SampleState::Discovered if filter_out_enabled => SampleState::FilterOut,
            SampleState::Discovered => SampleState::FilterIn,
            SampleState::FilterOut => SampleState::FilterIn,
            SampleState::FilterIn => SampleState::Reported,
            SampleState::Reported => SampleState::Done,
            SampleState::Done => SampleState::Done,
        }
    }
}

/// Scratch directory shared by all samples and stages. Wiped between
/// uses and removed on every exit path, including early failure.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: &Path) -> Result<Self> {
        let path = root.join("scratch");
        fs::create_dir_all(&path)
            .with_context(|| format!("cannot create scratch directory {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove everything inside the scratch area, keeping the directory
    /// itself so the next stage can reuse it.
    pub fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.path).ok();
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub samples_processed: usize,
    pub reportable_pairs: usize,
    pub skipped_files: Vec<String>,
}

struct ReportableHit {
    hit: ReferenceHit,
    alignment: PathBuf,
}

/// Execute the full pipeline for one configuration.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;

    let out = &config.output_dir;
    let logs_dir = out.join("logs");
    let reads_dir = out.join("reads");
    let analysis_dir = out.join("analysis");
    for dir in [out, &logs_dir, &reads_dir, &analysis_dir] {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    }
    let host_reads_dir = if config.filter_out_enabled() && config.keep_host_reads {
        let dir = out.join("host_reads");
        fs::create_dir_all(&dir)?;
        Some(dir)
    } else {
        None
    };
    config.write_snapshot(&out.join("run_config.json"))?;

    let (samples, skipped) =
        discover_samples(&config.input_dir, config.mode, config.unpaired_count)?;
    for file in &skipped {
        println!("WARNING: skipping {} (does not match the {} naming convention)", file, config.mode);
    }
    println!("Discovered {} {} sample(s)", samples.len(), config.mode);

    let mut tables = EvidenceTables::create(out, config.extended_coverage)?;
    let scratch = ScratchDir::create(out)?;
    let mut reportable: Vec<ReportableHit> = Vec::new();

    for (i, sample) in samples.iter().enumerate() {
        println!("[{}/{}] {}", i + 1, samples.len(), sample.name);
        process_sample(
            config,
            sample,
            &scratch,
            &logs_dir,
            &analysis_dir,
            host_reads_dir.as_deref(),
            &mut tables,
            &mut reportable,
        )?;
        // Bound disk usage: nothing from this sample leaks into the next.
        scratch.clear()?;
    }

    println!("Computing coverage for {} reportable pair(s)", reportable.len());
    let calculator = CoverageCalculator {
        threads: config.threads,
        scratch_dir: scratch.path().to_path_buf(),
        reads_dir,
        logs_dir,
    };
    let mut records = Vec::with_capacity(reportable.len());
    for entry in &reportable {
        records.push(calculator.record_for(&entry.hit, &entry.alignment)?);
    }
    tables.write_coverage(&records)?;

    Ok(RunReport {
        samples_processed: samples.len(),
        reportable_pairs: reportable.len(),
        skipped_files: skipped,
    })
}

fn process_sample(
    config: &RunConfig,
    sample: &Sample,
    scratch: &ScratchDir,
    logs_dir: &Path,
    analysis_dir: &Path,
    host_reads_dir: Option<&Path>,
    tables: &mut EvidenceTables,
    reportable: &mut Vec<ReportableHit>,
) -> Result<()> {
    let mut state = SampleState::Discovered;
    let mut reads = sample_inputs(sample);

    state = state.next(config.filter_out_enabled());
    if let Some(index) = &config.host_index {
        let plan = plan_filter_out(sample, index, config.threads, scratch.path(), host_reads_dir);
        let log = logs_dir.join(format!("{}_{}.log", sample.name, Stage::FilterOut));
        run_tool(BOWTIE2, &plan.args, &log)
            .with_context(|| format!("filter-out failed for sample '{}'", sample.name))?;
        fs::remove_file(&plan.sam_artifact).ok();
        reads = plan.unmatched;
        state = state.next(true);
    }

    debug_assert_eq!(state, SampleState::FilterIn);
    let plan = plan_filter_in(
        &sample.name,
        &reads,
        &config.reference,
        &config.breseq_options,
        config.threads,
        analysis_dir,
    );
    let log = logs_dir.join(format!("{}_{}.log", sample.name, Stage::FilterIn));
    run_tool(BRESEQ, &plan.args, &log)
        .with_context(|| format!("filter-in failed for sample '{}'", sample.name))?;
    state = state.next(false);

    debug_assert_eq!(state, SampleState::Reported);
    let summary = translate_summary_file(&plan.summary_path, &sample.name, config.threshold)?;
    tables.append_sample(&summary.counts, &summary.hits)?;
    for hit in summary.hits {
        reportable.push(ReportableHit {
            hit,
            alignment: plan.alignment_path.clone(),
        });
    }
    state = state.next(false);
    debug_assert_eq!(state, SampleState::Done);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_with_filter_out() {
        let mut state = SampleState::Discovered;
        let order = [
            SampleState::FilterOut,
            SampleState::FilterIn,
            SampleState::Reported,
            SampleState::Done,
        ];
        for expected in order {
            state = state.next(true);
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_state_machine_skips_filter_out_without_index() {
        let state = SampleState::Discovered.next(false);
        assert_eq!(state, SampleState::FilterIn);
    }

    #[test]
    fn test_done_is_terminal() {
        assert_eq!(SampleState::Done.next(true), SampleState::Done);
    }

    // Two single-end samples against one candidate reference: sample1
    // aligns 20% to REF1, sample2 only 3%, threshold 5. Only sample1's
    // hit is reportable; both samples get a counts row.
    #[test]
    fn test_two_sample_evidence_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = EvidenceTables::create(dir.path(), false).unwrap();
        let raw1 = "{\"reads\": {\"total_reads\": 100, \"total_aligned_reads\": 50}, \
                    \"references\": {\"reference\": {\"REF1\": {\"num_reads_mapped_to_reference\": 10}}}}";
        let raw2 = "{\"reads\": {\"total_reads\": 100, \"total_aligned_reads\": 100}, \
                    \"references\": {\"reference\": {\"REF1\": {\"num_reads_mapped_to_reference\": 3}}}}";
        let mut reportable = Vec::new();
        for (name, raw) in [("sample1", raw1), ("sample2", raw2)] {
            let summary = crate::summary::translate_summary(raw, name, 5.0).unwrap();
            tables.append_sample(&summary.counts, &summary.hits).unwrap();
            reportable.extend(summary.hits);
        }

        assert_eq!(reportable.len(), 1);
        let percent =
            std::fs::read_to_string(dir.path().join(crate::tables::PERCENT_FILE)).unwrap();
        assert_eq!(
            percent,
            "SAMPLE\tREFERENCE\tPERCENT_OF_READS_ALIGNED\nsample1\tREF1\t20\n"
        );
        let counts =
            std::fs::read_to_string(dir.path().join(crate::tables::COUNTS_FILE)).unwrap();
        assert_eq!(counts.lines().count(), 3);
    }

    #[test]
    fn test_scratch_dir_clear_keeps_directory() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).unwrap();
        std::fs::write(scratch.path().join("stale.sam"), "x").unwrap();
        std::fs::create_dir(scratch.path().join("sub")).unwrap();
        scratch.clear().unwrap();
        assert!(scratch.path().is_dir());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(root.path()).unwrap();
            std::fs::write(scratch.path().join("stale.sam"), "x").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
