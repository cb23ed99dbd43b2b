//! Pipeline stage execution
//!
//! One external tool invocation per stage: bowtie2 partitions reads
//! against the background index (filter-out), breseq quantifies the
//! surviving reads against the candidate references (filter-in).
//! Command lines are built by pure functions so the input-selection rules
//! for (mode, unpaired count) are testable without the tools installed.

use crate::samples::{Sample, SampleFiles};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const BOWTIE2: &str = "bowtie2";
pub const BRESEQ: &str = "breseq";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FilterOut,
    FilterIn,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::FilterOut => write!(f, "filter-out"),
            Stage::FilterIn => write!(f, "filter-in"),
        }
    }
}

/// Planned filter-out invocation: the bowtie2 argv plus the artifacts it
/// will leave behind.
#[derive(Debug, Clone)]
pub struct FilterOutPlan {
    pub args: Vec<String>,
    /// Unmatched (non-background) partitions, consumed by filter-in.
    pub unmatched: Vec<PathBuf>,
    /// Alignment-record scratch artifact, deleted before the next sample.
    pub sam_artifact: PathBuf,
}

/// Planned filter-in invocation: the breseq argv plus its output locations.
#[derive(Debug, Clone)]
pub struct FilterInPlan {
    pub args: Vec<String>,
    pub analysis_dir: PathBuf,
    pub summary_path: PathBuf,
    pub alignment_path: PathBuf,
}

/// The read files a stage consumes when no earlier stage has run:
/// one file single-end, R1/R2 plus the unpaired file(s) paired-end.
pub fn sample_inputs(sample: &Sample) -> Vec<PathBuf> {
    match &sample.files {
        SampleFiles::Single { reads } => vec![reads.clone()],
        SampleFiles::Paired {
            r1_paired,
            r2_paired,
            unpaired,
        } => {
            let mut inputs = vec![r1_paired.clone(), r2_paired.clone()];
            inputs.extend(unpaired.iter().cloned());
            inputs
        }
    }
}

/// Build the bowtie2 invocation for the filter-out stage.
///
/// Reads aligning to the background index are the "matched" partition
/// (only written when `retain_dir` is set); the unmatched partition feeds
/// filter-in. Paired inputs keep bowtie2's paired semantics: `-1/-2` for
/// the pairs, `-U` for the unpaired file(s), with separate unmatched
/// outputs for each.
pub fn plan_filter_out(
    sample: &Sample,
    host_index: &Path,
    threads: usize,
    scratch: &Path,
    retain_dir: Option<&Path>,
) -> FilterOutPlan {
    let name = &sample.name;
    let sam_artifact = scratch.join(format!("{}.sam", name));
    let mut args = vec![
        "-p".to_string(),
        threads.to_string(),
        "-x".to_string(),
        host_index.display().to_string(),
    ];
    let mut unmatched = Vec::new();

    match &sample.files {
        SampleFiles::Single { reads } => {
            let un = scratch.join(format!("{}_unmatched.fastq", name));
            args.push("-U".to_string());
            args.push(reads.display().to_string());
            args.push("--un".to_string());
            args.push(un.display().to_string());
            if let Some(dir) = retain_dir {
                args.push("--al".to_string());
                args.push(dir.join(format!("{}_host.fastq", name)).display().to_string());
            }
            unmatched.push(un);
        }
        SampleFiles::Paired {
            r1_paired,
            r2_paired,
            unpaired,
        } => {
            let un_conc = scratch.join(format!("{}_unmatched_R%.fastq", name));
            let un_single = scratch.join(format!("{}_unmatched_unpaired.fastq", name));
            args.push("-1".to_string());
            args.push(r1_paired.display().to_string());
            args.push("-2".to_string());
            args.push(r2_paired.display().to_string());
            let singles: Vec<String> = unpaired.iter().map(|p| p.display().to_string()).collect();
            args.push("-U".to_string());
            args.push(singles.join(","));
            args.push("--un-conc".to_string());
            args.push(un_conc.display().to_string());
            args.push("--un".to_string());
            args.push(un_single.display().to_string());
            if let Some(dir) = retain_dir {
                args.push("--al-conc".to_string());
                args.push(dir.join(format!("{}_host_R%.fastq", name)).display().to_string());
                args.push("--al".to_string());
                args.push(dir.join(format!("{}_host_unpaired.fastq", name)).display().to_string());
            }
            unmatched.push(scratch.join(format!("{}_unmatched_R1.fastq", name)));
            unmatched.push(scratch.join(format!("{}_unmatched_R2.fastq", name)));
            unmatched.push(un_single);
        }
    }

    args.push("-S".to_string());
    args.push(sam_artifact.display().to_string());

    FilterOutPlan {
        args,
        unmatched,
        sam_artifact,
    }
}

/// Build the breseq invocation for the filter-in stage over `reads`
/// (either the raw sample files or the filter-out unmatched partitions).
pub fn plan_filter_in(
    sample_name: &str,
    reads: &[PathBuf],
    reference: &Path,
    options: &str,
    threads: usize,
    analysis_root: &Path,
) -> FilterInPlan {
    let analysis_dir = analysis_root.join(sample_name);
    let mut args: Vec<String> = options.split_whitespace().map(str::to_string).collect();
    args.push("-r".to_string());
    args.push(reference.display().to_string());
    args.push("-j".to_string());
    args.push(threads.to_string());
    args.push("-o".to_string());
    args.push(analysis_dir.display().to_string());
    for read in reads {
        args.push(read.display().to_string());
    }

    FilterInPlan {
        summary_path: analysis_dir.join("data").join("summary.json"),
        alignment_path: analysis_dir.join("data").join("reference.bam"),
        analysis_dir,
        args,
    }
}

/// Run one external tool invocation, writing its captured stdout and
/// stderr to `log_path`. A non-zero exit status is fatal for the run.
pub fn run_tool(program: &str, args: &[String], log_path: &Path) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to launch {} (is it installed?)", program))?;

    let mut log = output.stdout;
    log.extend_from_slice(&output.stderr);
    fs::write(log_path, &log)
        .with_context(|| format!("cannot write log {}", log_path.display()))?;

    if !output.status.success() {
        bail!(
            "{} exited with status {} (see {})",
            program,
            output.status.code().map_or_else(|| "unknown".to_string(), |c| c.to_string()),
            log_path.display()
        );
    }
    Ok(())
}

/// Like `run_tool`, but returns the tool's stdout as data; only stderr
/// goes to the log file.
pub fn run_tool_capture(program: &str, args: &[String], log_path: &Path) -> Result<Vec<u8>> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to launch {} (is it installed?)", program))?;

    fs::write(log_path, &output.stderr)
        .with_context(|| format!("cannot write log {}", log_path.display()))?;

    if !output.status.success() {
        bail!(
            "{} exited with status {} (see {})",
            program,
            output.status.code().map_or_else(|| "unknown".to_string(), |c| c.to_string()),
            log_path.display()
        );
    }
    Ok(output.stdout)
}
