//! Sample discovery and grouping
//!
//! Turns a directory of raw read files into an ordered list of logical
//! samples. Grouping operates on file names only, so the naming rules are
//! testable without touching a filesystem:
//! - single-end: every FASTQ file is its own sample (extension stripped)
//! - paired-end: everything from the first `_R` marker onward is stripped,
//!   collapsing R1/R2 (and paired/unpaired) variants into one sample name

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Accepted FASTQ-family extensions, longest first so `.fastq.gz` wins
/// over `.gz`-less suffix checks.
const FASTQ_EXTENSIONS: [&str; 4] = [".fastq.gz", ".fq.gz", ".fastq", ".fq"];

/// Read-pair marker separating the sample name from the read-direction part.
const PAIR_MARKER: &str = "_R";

/// Sequencing layout of the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadMode {
    SingleEnd,
    PairedEnd,
}

impl ReadMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "single" | "single-end" => Ok(ReadMode::SingleEnd),
            "paired" | "paired-end" => Ok(ReadMode::PairedEnd),
            other => bail!("unsupported read mode '{}' (expected 'single' or 'paired')", other),
        }
    }
}

impl std::fmt::Display for ReadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadMode::SingleEnd => write!(f, "single-end"),
            ReadMode::PairedEnd => write!(f, "paired-end"),
        }
    }
}

/// Concrete read files backing one sample.
#[derive(Debug, Clone)]
pub enum SampleFiles {
    Single {
        reads: PathBuf,
    },
    Paired {
        r1_paired: PathBuf,
        r2_paired: PathBuf,
        unpaired: Vec<PathBuf>,
    },
}

/// One logical unit of input reads, created at discovery time and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub mode: ReadMode,
    pub files: SampleFiles,
}

/// Result of grouping a list of file names into sample names.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// Unique sample names in natural alphanumeric order.
    pub names: Vec<String>,
    /// Files that could not be attributed to any sample.
    pub skipped: Vec<String>,
}

/// Strip a FASTQ-family extension, returning the base name.
/// `None` if the file is not a FASTQ file.
pub fn strip_fastq_extension(file_name: &str) -> Option<&str> {
    FASTQ_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
}

/// Natural alphanumeric comparison: digit runs compare as numbers, text
/// runs compare case-insensitively, so `sample2` sorts before `sample10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    // Leading zeros stripped; longer digit run means larger number, ties
    // broken lexically. Avoids overflow on arbitrarily long digit runs.
    Digits(usize, String),
    Text(String),
}

fn natural_key(s: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;
    for c in s.chars() {
        if c.is_ascii_digit() == in_digits && !current.is_empty() {
            current.push(c);
        } else {
            if !current.is_empty() {
                chunks.push(make_chunk(current, in_digits));
            }
            in_digits = c.is_ascii_digit();
            current = c.to_string();
        }
    }
    if !current.is_empty() {
        chunks.push(make_chunk(current, in_digits));
    }
    chunks
}

fn make_chunk(raw: String, digits: bool) -> Chunk {
    if digits {
        let trimmed = raw.trim_start_matches('0');
        let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
        Chunk::Digits(trimmed.len(), trimmed.to_string())
    } else {
        Chunk::Text(raw.to_lowercase())
    }
}

/// Group single-end file names: one sample per distinct base name.
pub fn group_single_end(file_names: &[String]) -> Grouping {
    let mut grouping = Grouping::default();
    for name in file_names {
        match strip_fastq_extension(name) {
            Some(base) => {
                if !grouping.names.iter().any(|n| n == base) {
                    grouping.names.push(base.to_string());
                }
            }
            None => grouping.skipped.push(name.clone()),
        }
    }
    grouping.names.sort_by(|a, b| natural_cmp(a, b));
    grouping
}

/// Group paired-end file names: strip the extension, then everything from
/// the first `_R` marker onward. Files without the marker cannot be
/// attributed to a sample and are reported as skipped.
pub fn group_paired_end(file_names: &[String]) -> Grouping {
    let mut grouping = Grouping::default();
    for name in file_names {
        let base = match strip_fastq_extension(name) {
            Some(base) => base,
            None => {
                grouping.skipped.push(name.clone());
                continue;
            }
        };
        match base.find(PAIR_MARKER) {
            Some(idx) => {
                let sample = &base[..idx];
                if !grouping.names.iter().any(|n| n == sample) {
                    grouping.names.push(sample.to_string());
                }
            }
            None => grouping.skipped.push(name.clone()),
        }
    }
    grouping.names.sort_by(|a, b| natural_cmp(a, b));
    grouping
}

/// Fail-fast pairing precondition: at least one R1/R2 pair, and equal
/// counts of R1-paired and R2-paired files across the directory.
pub fn validate_pairing(file_names: &[String]) -> Result<()> {
    let is_paired_read = |name: &&String, marker: &str| {
        strip_fastq_extension(name).is_some()
            && name.contains(marker)
            && !name.contains("unpaired")
    };
    let r1 = file_names.iter().filter(|n| is_paired_read(n, "_R1")).count();
    let r2 = file_names.iter().filter(|n| is_paired_read(n, "_R2")).count();
    if r1 == 0 || r2 == 0 {
        bail!("no R1/R2 paired read files found (R1: {}, R2: {})", r1, r2);
    }
    if r1 != r2 {
        bail!("mismatched paired read files: {} R1 vs {} R2", r1, r2);
    }
    Ok(())
}

/// Discover and validate all samples in `input_dir`.
///
/// Returns the samples in natural alphanumeric order plus the list of file
/// names that were skipped by the grouping rules.
pub fn discover_samples(
    input_dir: &Path,
    mode: ReadMode,
    unpaired_count: usize,
) -> Result<(Vec<Sample>, Vec<String>)> {
    let mut file_names = Vec::new();
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("cannot read input directory {}", input_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                file_names.push(name.to_string());
            }
        }
    }
    file_names.sort_by(|a, b| natural_cmp(a, b));

    if !file_names.iter().any(|n| strip_fastq_extension(n).is_some()) {
        bail!(
            "no FASTQ read files found in {} (expected .fastq/.fq, optionally gzipped)",
            input_dir.display()
        );
    }

    match mode {
        ReadMode::SingleEnd => {
            let grouping = group_single_end(&file_names);
            let mut by_name: BTreeMap<&str, &String> = BTreeMap::new();
            for file in &file_names {
                if let Some(base) = strip_fastq_extension(file) {
                    by_name.entry(base).or_insert(file);
                }
            }
            let samples = grouping
                .names
                .iter()
                .map(|name| Sample {
                    name: name.clone(),
                    mode,
                    files: SampleFiles::Single {
                        reads: input_dir.join(by_name[name.as_str()]),
                    },
                })
                .collect();
            Ok((samples, grouping.skipped))
        }
        ReadMode::PairedEnd => {
            validate_pairing(&file_names)?;
            let grouping = group_paired_end(&file_names);
            if grouping.names.is_empty() {
                bail!("no paired-end samples could be grouped in {}", input_dir.display());
            }
            let mut samples = Vec::with_capacity(grouping.names.len());
            for name in &grouping.names {
                samples.push(resolve_paired_sample(input_dir, name, &file_names, unpaired_count)?);
            }
            Ok((samples, grouping.skipped))
        }
    }
}

/// Resolve the concrete R1/R2/unpaired files for one paired-end sample.
fn resolve_paired_sample(
    input_dir: &Path,
    sample_name: &str,
    file_names: &[String],
    unpaired_count: usize,
) -> Result<Sample> {
    let mut r1_paired = None;
    let mut r2_paired = None;
    let mut unpaired = Vec::new();

    for file in file_names {
        let base = match strip_fastq_extension(file) {
            Some(base) => base,
            None => continue,
        };
        // Exact sample match at the marker boundary, so `sample1` never
        // claims `sample10_R1.fastq`.
        let owned = match base.find(PAIR_MARKER) {
            Some(idx) => &base[..idx] == sample_name,
            None => false,
        };
        if !owned {
            continue;
        }
        let path = input_dir.join(file);
        if file.contains("unpaired") {
            unpaired.push(path);
        } else if file.contains("_R1") {
            if r1_paired.replace(path).is_some() {
                bail!("sample '{}' has more than one R1 paired read file", sample_name);
            }
        } else if file.contains("_R2") {
            if r2_paired.replace(path).is_some() {
                bail!("sample '{}' has more than one R2 paired read file", sample_name);
            }
        }
    }

    let r1_paired = r1_paired
        .with_context(|| format!("sample '{}' is missing its R1 paired read file", sample_name))?;
    let r2_paired = r2_paired
        .with_context(|| format!("sample '{}' is missing its R2 paired read file", sample_name))?;
    if unpaired.len() != unpaired_count {
        bail!(
            "sample '{}' has {} unpaired read file(s), expected {}",
            sample_name,
            unpaired.len(),
            unpaired_count
        );
    }

    Ok(Sample {
        name: sample_name.to_string(),
        mode: ReadMode::PairedEnd,
        files: SampleFiles::Paired {
            r1_paired,
            r2_paired,
            unpaired,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_fastq_extension() {
        assert_eq!(strip_fastq_extension("a.fastq"), Some("a"));
        assert_eq!(strip_fastq_extension("a.fq.gz"), Some("a"));
        assert_eq!(strip_fastq_extension("a.fastq.gz"), Some("a"));
        assert_eq!(strip_fastq_extension("a.txt"), None);
    }

    #[test]
    fn test_natural_order() {
        let mut v = names(&["sample10", "sample2", "sample1"]);
        v.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(v, names(&["sample1", "sample2", "sample10"]));
    }

    #[test]
    fn test_natural_order_case_and_zeros() {
        assert_eq!(natural_cmp("Sample02", "sample2"), Ordering::Equal);
        assert_eq!(natural_cmp("s9b", "s10a"), Ordering::Less);
    }

    #[test]
    fn test_group_single_end() {
        let grouping = group_single_end(&names(&["b.fastq", "a.fq.gz", "notes.txt"]));
        assert_eq!(grouping.names, names(&["a", "b"]));
        assert_eq!(grouping.skipped, names(&["notes.txt"]));
    }

    #[test]
    fn test_group_single_end_distinct_bases() {
        let grouping = group_single_end(&names(&["a.fastq", "a.fq"]));
        assert_eq!(grouping.names, names(&["a"]));
    }

    #[test]
    fn test_group_paired_end_collapses_directions() {
        let grouping = group_paired_end(&names(&[
            "s1_R1_paired.fastq",
            "s1_R2_paired.fastq",
            "s1_R1_unpaired.fastq",
            "s1_R2_unpaired.fastq",
            "s2_R1_paired.fastq",
            "s2_R2_paired.fastq",
        ]));
        assert_eq!(grouping.names, names(&["s1", "s2"]));
        assert!(grouping.skipped.is_empty());
    }

    #[test]
    fn test_group_paired_end_skips_unmarked_files() {
        let grouping = group_paired_end(&names(&["s1_R1.fastq", "s1_R2.fastq", "odd.fastq"]));
        assert_eq!(grouping.names, names(&["s1"]));
        assert_eq!(grouping.skipped, names(&["odd.fastq"]));
    }

    #[test]
    fn test_validate_pairing_mismatch() {
        let err = validate_pairing(&names(&["s1_R1.fastq", "s1_R2.fastq", "s2_R1.fastq"]))
            .unwrap_err();
        assert!(err.to_string().contains("mismatched"));
    }

    #[test]
    fn test_validate_pairing_none_found() {
        assert!(validate_pairing(&names(&["s1.fastq"])).is_err());
    }

    #[test]
    fn test_validate_pairing_ignores_unpaired() {
        validate_pairing(&names(&[
            "s1_R1_paired.fastq",
            "s1_R2_paired.fastq",
            "s1_R1_unpaired.fastq",
        ]))
        .unwrap();
    }

    #[test]
    fn test_discover_single_end() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["sample10.fastq", "sample2.fastq"] {
            std::fs::write(dir.path().join(f), "@r\nA\n+\nI\n").unwrap();
        }
        let (samples, skipped) =
            discover_samples(dir.path(), ReadMode::SingleEnd, 1).unwrap();
        let names: Vec<&str> = samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["sample2", "sample10"]);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_discover_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_samples(dir.path(), ReadMode::SingleEnd, 1).is_err());
    }

    #[test]
    fn test_discover_paired_end_resolves_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            "s1_R1_paired.fastq",
            "s1_R2_paired.fastq",
            "s1_R1_unpaired.fastq",
            "s1_R2_unpaired.fastq",
        ];
        for f in files {
            std::fs::write(dir.path().join(f), "@r\nA\n+\nI\n").unwrap();
        }
        let (samples, _) = discover_samples(dir.path(), ReadMode::PairedEnd, 2).unwrap();
        assert_eq!(samples.len(), 1);
        match &samples[0].files {
            SampleFiles::Paired {
                r1_paired,
                r2_paired,
                unpaired,
            } => {
                assert!(r1_paired.ends_with("s1_R1_paired.fastq"));
                assert!(r2_paired.ends_with("s1_R2_paired.fastq"));
                assert_eq!(unpaired.len(), 2);
            }
            _ => panic!("expected paired files"),
        }
    }

    #[test]
    fn test_discover_paired_end_wrong_unpaired_count() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["s1_R1_paired.fastq", "s1_R2_paired.fastq", "s1_R1_unpaired.fastq"] {
            std::fs::write(dir.path().join(f), "@r\nA\n+\nI\n").unwrap();
        }
        assert!(discover_samples(dir.path(), ReadMode::PairedEnd, 2).is_err());
    }

    #[test]
    fn test_discover_paired_end_no_prefix_collision() {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            "s1_R1_paired.fastq",
            "s1_R2_paired.fastq",
            "s1_R1_unpaired.fastq",
            "s10_R1_paired.fastq",
            "s10_R2_paired.fastq",
            "s10_R1_unpaired.fastq",
        ];
        for f in files {
            std::fs::write(dir.path().join(f), "@r\nA\n+\nI\n").unwrap();
        }
        let (samples, _) = discover_samples(dir.path(), ReadMode::PairedEnd, 1).unwrap();
        assert_eq!(samples.len(), 2);
        match &samples[0].files {
            SampleFiles::Paired { r1_paired, .. } => {
                assert!(r1_paired.ends_with("s1_R1_paired.fastq"));
            }
            _ => panic!("expected paired files"),
        }
    }
}
