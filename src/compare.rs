//! Directory-level comparison of two capture sets.
//!
//! Files are paired by filename across the two directories; files present
//! on only one side do not fail the run but are listed as skipped so
//! additions and removals stay visible. Per-file failures are isolated —
//! one unreadable raster does not stop the remaining pairs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::analyze::{Analyzer, DifferenceAnalysis};
use crate::diff::{diff_images, DiffOutcome};
use crate::util::list_png_names;

/// Default aggregate pass/fail threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Per-comparison options. Unknown fields are rejected when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareOptions {
    /// Maximum acceptable difference ratio per file
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Where diff rasters go (default: `<dir_b>/diffs`)
    #[serde(default)]
    pub diff_dir: Option<PathBuf>,

    /// Forward failing pairs to the analyzer collaborator
    #[serde(default)]
    pub analyze: bool,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            diff_dir: None,
            analyze: false,
        }
    }
}

/// One failing filename pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Filename shared by both sides
    pub file: String,

    /// Difference ratio for the pair
    pub difference: f64,

    /// True when the rasters had different dimensions
    pub dimension_mismatch: bool,

    /// Path of the written diff raster
    pub diff_path: PathBuf,

    /// Analyzer output for this pair, when requested
    pub analysis: Option<DifferenceAnalysis>,

    /// Analyzer-suggested CSS fixes, when requested
    pub css_suggestions: Vec<String>,
}

/// Per-file outcome, failing or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    /// Difference ratio (1.0 when the pair could not be compared)
    pub difference: f64,

    /// Whether the pair stayed within the threshold
    pub passed: bool,

    /// Diff failure message, when the pair could not be compared
    pub error: Option<String>,
}

/// Aggregate outcome of one comparison run.
///
/// `report` is keyed by filename in a `BTreeMap`, and the directory
/// listings are sorted, so the aggregate is independent of filesystem
/// listing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// True when no pair failed
    pub passed: bool,

    /// Number of filename pairs compared
    pub total_images: usize,

    /// Failing pairs
    pub differences: Vec<DiffEntry>,

    /// Per-file outcomes, keyed by filename
    pub report: BTreeMap<String, FileReport>,

    /// Filenames present only in the first directory
    pub skipped_only_in_a: Vec<String>,

    /// Filenames present only in the second directory
    pub skipped_only_in_b: Vec<String>,
}

/// Compare every filename pair across two capture directories.
pub fn compare_directories(
    dir_a: &Path,
    dir_b: &Path,
    options: &CompareOptions,
    analyzer: Option<&dyn Analyzer>,
) -> DiffOutcome<ComparisonReport> {
    let names_a = list_png_names(dir_a)?;
    let names_b = list_png_names(dir_b)?;

    let shared: Vec<&String> = names_a.iter().filter(|n| names_b.contains(n)).collect();
    let skipped_only_in_a: Vec<String> = names_a
        .iter()
        .filter(|n| !names_b.contains(n))
        .cloned()
        .collect();
    let skipped_only_in_b: Vec<String> = names_b
        .iter()
        .filter(|n| !names_a.contains(n))
        .cloned()
        .collect();

    let diff_dir = options
        .diff_dir
        .clone()
        .unwrap_or_else(|| dir_b.join("diffs"));
    std::fs::create_dir_all(&diff_dir)?;

    let mut differences = Vec::new();
    let mut report = BTreeMap::new();

    for name in &shared {
        let path_a = dir_a.join(name.as_str());
        let path_b = dir_b.join(name.as_str());
        let diff_path = diff_dir.join(format!("diff_{}", name));

        match diff_images(&path_a, &path_b, &diff_path, options.threshold) {
            Ok(result) => {
                report.insert(
                    (*name).clone(),
                    FileReport {
                        difference: result.difference_ratio,
                        passed: result.passed,
                        error: None,
                    },
                );
                if !result.passed {
                    let (analysis, css_suggestions) = match analyzer {
                        Some(a) if options.analyze => {
                            let analysis = a.analyze_difference(&path_a, &path_b, &diff_path);
                            let fixes = a.suggest_css_fixes(&analysis);
                            (Some(analysis), fixes)
                        }
                        _ => (None, Vec::new()),
                    };
                    differences.push(DiffEntry {
                        file: (*name).clone(),
                        difference: result.difference_ratio,
                        dimension_mismatch: result.dimension_mismatch,
                        diff_path: result.diff_artifact_path,
                        analysis,
                        css_suggestions,
                    });
                }
            }
            Err(err) => {
                // Isolated per-file failure: recorded, counted as failing,
                // and the remaining pairs still run.
                eprintln!("Warning: diff failed for {}: {}", name, err);
                report.insert(
                    (*name).clone(),
                    FileReport {
                        difference: 1.0,
                        passed: false,
                        error: Some(err.to_string()),
                    },
                );
                differences.push(DiffEntry {
                    file: (*name).clone(),
                    difference: 1.0,
                    dimension_mismatch: false,
                    diff_path,
                    analysis: None,
                    css_suggestions: Vec::new(),
                });
            }
        }
    }

    Ok(ComparisonReport {
        passed: differences.is_empty(),
        total_images: shared.len(),
        differences,
        report,
        skipped_only_in_a,
        skipped_only_in_b,
    })
}
