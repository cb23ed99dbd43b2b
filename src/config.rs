//! Run configuration
//!
//! One `RunConfig` is built from the command line at startup, validated
//! before any stage runs, and passed by reference into every component.
//! A JSON snapshot of the effective configuration is written into the
//! output directory for the record.

use crate::samples::ReadMode;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: ReadMode,
    /// Unpaired read files per paired-end sample (1 or 2).
    pub unpaired_count: usize,
    /// Background reference index; enables the filter-out stage.
    pub host_index: Option<PathBuf>,
    /// Candidate-reference file (Genbank, one record per locus).
    pub reference: PathBuf,
    pub threads: usize,
    /// Minimum percent of aligned reads for a reference to be reported.
    pub threshold: f64,
    /// Pass-through options for the filter-in tool.
    pub breseq_options: String,
    pub extended_coverage: bool,
    pub keep_host_reads: bool,
}

impl RunConfig {
    /// Validate every configuration precondition before the first stage
    /// runs: paths, numeric ranges, and required tool binaries.
    pub fn validate(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            bail!("input directory not found: {}", self.input_dir.display());
        }
        if !self.reference.is_file() {
            bail!("candidate-reference file not found: {}", self.reference.display());
        }
        if self.threads == 0 {
            bail!("thread count must be a positive integer");
        }
        if !(self.threshold >= 0.0) {
            bail!("reporting threshold must be a non-negative number");
        }
        if self.mode == ReadMode::PairedEnd && !(self.unpaired_count == 1 || self.unpaired_count == 2) {
            bail!("unpaired file count must be 1 or 2, got {}", self.unpaired_count);
        }
        if let Some(index) = &self.host_index {
            // A bowtie2 index is a basename, not a file; its directory
            // must exist.
            match index.parent() {
                Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => {}
                _ => bail!("background index directory not found: {}", index.display()),
            }
            check_tool(crate::stages::BOWTIE2)?;
        }
        check_tool(crate::stages::BRESEQ)?;
        check_tool(crate::coverage::SAMTOOLS)?;
        Ok(())
    }

    /// Whether the filter-out stage runs for this configuration.
    pub fn filter_out_enabled(&self) -> bool {
        self.host_index.is_some()
    }

    /// Write a JSON snapshot of the effective configuration.
    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write config snapshot {}", path.display()))?;
        Ok(())
    }
}

/// Fail fast when a required external tool is not on PATH.
fn check_tool(program: &str) -> Result<()> {
    let found = Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok();
    if !found {
        bail!("required tool '{}' not found on PATH", program);
    }
    Ok(())
}
