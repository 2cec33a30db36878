//! Baseline auto-selection.
//!
//! Picks the stored snapshot that structurally matches a fresh capture
//! directory best, by comparing file-name sets rather than pixels. The
//! working baseline is the safe default whenever nothing scores above the
//! threshold.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::baseline::store::BaselineStore;
use crate::baseline::types::{BaselineResult, CURRENT};
use crate::util::list_png_names;

/// Score a candidate must strictly exceed to displace the working baseline.
pub const DEFAULT_SELECT_THRESHOLD: f64 = 0.8;

/// A scored auto-selection candidate.
#[derive(Debug, Clone)]
pub struct BaselineCandidate {
    /// "current", a branch name, or a version id
    pub name: String,

    /// Snapshot directory to compare against
    pub snapshot_location: PathBuf,

    /// Structural similarity in [0, 1]
    pub score: f64,
}

/// |A ∩ B| / max(|A|, |B|), with empty-vs-empty scoring 1.0.
fn name_overlap_score(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / larger as f64
}

fn name_set(dir: &Path) -> BaselineResult<BTreeSet<String>> {
    Ok(list_png_names(dir)?.into_iter().collect())
}

/// Pick the best-matching stored snapshot for a fresh capture directory.
///
/// Candidates are scored in a fixed order (current, branches by name,
/// versions by creation) and only a strictly greater score displaces an
/// earlier candidate, so ties resolve deterministically. Candidates whose
/// snapshot directory is missing are skipped.
pub fn auto_select(
    store: &BaselineStore,
    fresh_dir: &Path,
    threshold: f64,
) -> BaselineResult<BaselineCandidate> {
    let metadata = store.load_metadata()?;
    let fresh_names = name_set(fresh_dir)?;

    let current_dir = store.current_dir();
    let current_score = if current_dir.is_dir() {
        name_overlap_score(&fresh_names, &name_set(&current_dir)?)
    } else {
        0.0
    };
    let fallback = BaselineCandidate {
        name: CURRENT.to_string(),
        snapshot_location: current_dir,
        score: current_score,
    };

    let mut best = fallback.clone();

    for (name, branch) in &metadata.branches {
        if !branch.snapshot_location.is_dir() {
            continue;
        }
        let score = name_overlap_score(&fresh_names, &name_set(&branch.snapshot_location)?);
        if score > best.score {
            best = BaselineCandidate {
                name: name.clone(),
                snapshot_location: branch.snapshot_location.clone(),
                score,
            };
        }
    }

    for version in &metadata.versions {
        if !version.snapshot_location.is_dir() {
            continue;
        }
        let score = name_overlap_score(&fresh_names, &name_set(&version.snapshot_location)?);
        if score > best.score {
            best = BaselineCandidate {
                name: version.id.clone(),
                snapshot_location: version.snapshot_location.clone(),
                score,
            };
        }
    }

    if best.score > threshold {
        Ok(best)
    } else {
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_pngs(dir: &Path, names: &[&str]) {
        std::fs::create_dir_all(dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), b"png").unwrap();
        }
    }

    #[test]
    fn test_identical_sets_select_current_at_full_score() {
        let tmp = TempDir::new().unwrap();
        let store = BaselineStore::new(tmp.path());
        write_pngs(&store.current_dir(), &["a.png", "b.png"]);

        let fresh = TempDir::new().unwrap();
        write_pngs(fresh.path(), &["a.png", "b.png"]);

        let pick = auto_select(&store, fresh.path(), DEFAULT_SELECT_THRESHOLD).unwrap();
        assert_eq!(pick.name, CURRENT);
        assert_eq!(pick.score, 1.0);
    }

    #[test]
    fn test_better_branch_displaces_current() {
        let tmp = TempDir::new().unwrap();
        let store = BaselineStore::new(tmp.path());
        write_pngs(&store.current_dir(), &["old.png"]);
        store.create_branch("feature").unwrap();
        let branch_dir = tmp.path().join("branches").join("feature");
        std::fs::remove_file(branch_dir.join("old.png")).unwrap();
        write_pngs(&branch_dir, &["a.png", "b.png", "c.png"]);

        let fresh = TempDir::new().unwrap();
        write_pngs(fresh.path(), &["a.png", "b.png", "c.png"]);

        let pick = auto_select(&store, fresh.path(), DEFAULT_SELECT_THRESHOLD).unwrap();
        assert_eq!(pick.name, "feature");
        assert!(pick.score > 0.8);
    }

    #[test]
    fn test_below_threshold_falls_back_to_current() {
        let tmp = TempDir::new().unwrap();
        let store = BaselineStore::new(tmp.path());
        write_pngs(&store.current_dir(), &["x.png"]);
        store.create_branch("partial").unwrap();
        write_pngs(
            &tmp.path().join("branches").join("partial"),
            &["a.png", "z.png"],
        );

        let fresh = TempDir::new().unwrap();
        write_pngs(fresh.path(), &["a.png", "b.png", "c.png"]);

        // Best overlap is 1/3, below the threshold.
        let pick = auto_select(&store, fresh.path(), DEFAULT_SELECT_THRESHOLD).unwrap();
        assert_eq!(pick.name, CURRENT);
    }

    #[test]
    fn test_missing_snapshot_dir_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = BaselineStore::new(tmp.path());
        write_pngs(&store.current_dir(), &["a.png"]);
        store.create_branch("ghost").unwrap();
        std::fs::remove_dir_all(tmp.path().join("branches").join("ghost")).unwrap();

        let fresh = TempDir::new().unwrap();
        write_pngs(fresh.path(), &["a.png"]);

        let pick = auto_select(&store, fresh.path(), DEFAULT_SELECT_THRESHOLD).unwrap();
        assert_eq!(pick.name, CURRENT);
        assert_eq!(pick.score, 1.0);
    }

    #[test]
    fn test_equal_scores_keep_earlier_candidate() {
        let tmp = TempDir::new().unwrap();
        let store = BaselineStore::new(tmp.path());
        write_pngs(&store.current_dir(), &["a.png"]);
        store.create_branch("twin").unwrap();

        let fresh = TempDir::new().unwrap();
        write_pngs(fresh.path(), &["a.png"]);

        // Branch "twin" scores 1.0 too; current wins the tie.
        let pick = auto_select(&store, fresh.path(), DEFAULT_SELECT_THRESHOLD).unwrap();
        assert_eq!(pick.name, CURRENT);
    }
}
