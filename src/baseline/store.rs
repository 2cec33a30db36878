//! Durable baseline version store.
//!
//! All state lives under one root directory:
//!
//! ```text
//! <root>/
//!   current/            working baseline rasters
//!   versions/<id>/      immutable version snapshots
//!   branches/<name>/    switchable branch snapshots
//!   backups/<stamp>/    timestamped safety copies
//!   metadata.json       the BaselineMetadata document
//! ```
//!
//! Every mutating operation re-reads `metadata.json`, mutates in memory,
//! and persists the whole document. Concurrent writers race; callers own
//! the single-writer contract.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::baseline::types::{
    BaselineBranch, BaselineError, BaselineMetadata, BaselineResult, BaselineVersion,
    RollbackRecord, CURRENT, METADATA_FILE,
};
use crate::util::{copy_dir_all, generate_timestamp, sanitize_name};

/// Disambiguates version ids created within the same millisecond.
static VERSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Options for [`BaselineStore::update_baseline`].
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Back up the working baseline before overwriting
    pub backup: bool,

    /// Copy only the files listed in `files`
    pub selective: bool,

    /// File names to copy when `selective` is set
    pub files: Vec<String>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            backup: true,
            selective: false,
            files: Vec::new(),
        }
    }
}

/// Version store rooted at one baseline directory.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    root: PathBuf,
}

impl BaselineStore {
    /// Open (and lazily create) a store at the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the configured default baseline directory.
    pub fn from_env() -> Self {
        Self::new(&crate::config::get().baseline.root_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the working baseline rasters.
    pub fn current_dir(&self) -> PathBuf {
        self.root.join(CURRENT)
    }

    fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    fn branches_dir(&self) -> PathBuf {
        self.root.join("branches")
    }

    fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Load the metadata document, defaulting when none exists yet.
    pub fn load_metadata(&self) -> BaselineResult<BaselineMetadata> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(BaselineMetadata::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn persist_metadata(&self, metadata: &BaselineMetadata) -> BaselineResult<()> {
        std::fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(metadata)?;
        std::fs::write(self.metadata_path(), json)?;
        Ok(())
    }

    fn ensure_current(&self) -> BaselineResult<PathBuf> {
        let current = self.current_dir();
        std::fs::create_dir_all(&current)?;
        Ok(current)
    }

    /// Timestamped copy of `current/` under `backups/`.
    fn backup_current(&self) -> BaselineResult<PathBuf> {
        let current = self.ensure_current()?;
        let backup = self.backups_dir().join(generate_timestamp());
        copy_dir_all(&current, &backup)?;
        Ok(backup)
    }

    /// Snapshot the working baseline under a fresh unique version id.
    pub fn create_version(&self, name: &str, description: &str) -> BaselineResult<BaselineVersion> {
        let mut metadata = self.load_metadata()?;
        let current = self.ensure_current()?;

        let millis = Utc::now().timestamp_millis();
        let seq = VERSION_SEQ.fetch_add(1, Ordering::SeqCst);
        let id = format!("v_{}_{}", millis, seq);

        let snapshot = self.versions_dir().join(&id);
        copy_dir_all(&current, &snapshot)?;

        let version = BaselineVersion {
            id,
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            source_control_branch: git_branch(),
            source_control_revision: git_revision(),
            snapshot_location: snapshot,
        };

        metadata.versions.push(version.clone());
        self.persist_metadata(&metadata)?;
        Ok(version)
    }

    /// Overwrite the working baseline from a source capture directory.
    pub fn update_baseline(
        &self,
        source_dir: &Path,
        options: &UpdateOptions,
    ) -> BaselineResult<()> {
        let mut metadata = self.load_metadata()?;
        let current = self.ensure_current()?;

        if options.backup {
            self.backup_current()?;
        }

        if options.selective {
            for file in &options.files {
                if !is_plain_file_name(file) {
                    return Err(BaselineError::InvalidName(file.clone()));
                }
                let src = source_dir.join(file);
                if !src.is_file() {
                    return Err(BaselineError::NotFound(src.display().to_string()));
                }
                std::fs::copy(&src, current.join(file))?;
            }
        } else {
            std::fs::remove_dir_all(&current)?;
            copy_dir_all(source_dir, &current)?;
        }

        metadata.last_update = Some(Utc::now());
        self.persist_metadata(&metadata)?;
        Ok(())
    }

    /// Snapshot the working baseline into a named branch.
    pub fn create_branch(&self, name: &str) -> BaselineResult<BaselineBranch> {
        let mut metadata = self.load_metadata()?;
        let current = self.ensure_current()?;

        let safe_name = sanitize_name(name);
        let snapshot = self.branches_dir().join(&safe_name);
        copy_dir_all(&current, &snapshot)?;

        let branch = BaselineBranch {
            name: safe_name.clone(),
            created_at: Utc::now(),
            source_control_branch: git_branch(),
            parent: metadata.current_pointer.clone(),
            snapshot_location: snapshot,
        };

        metadata.branches.insert(safe_name, branch.clone());
        self.persist_metadata(&metadata)?;
        Ok(branch)
    }

    /// Replace the working baseline with a branch snapshot.
    pub fn switch_branch(&self, name: &str) -> BaselineResult<()> {
        let mut metadata = self.load_metadata()?;
        let safe_name = sanitize_name(name);

        let branch = metadata
            .branches
            .get(&safe_name)
            .cloned()
            .ok_or_else(|| BaselineError::NotFound(format!("branch {}", safe_name)))?;

        self.backup_current()?;
        let current = self.current_dir();
        std::fs::remove_dir_all(&current)?;
        copy_dir_all(&branch.snapshot_location, &current)?;

        metadata.current_pointer = safe_name;
        metadata.last_update = Some(Utc::now());
        self.persist_metadata(&metadata)?;
        Ok(())
    }

    /// Restore a version snapshot over the working baseline.
    pub fn rollback(&self, version_id: &str) -> BaselineResult<()> {
        let mut metadata = self.load_metadata()?;

        let version = metadata
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .cloned()
            .ok_or_else(|| BaselineError::NotFound(format!("version {}", version_id)))?;

        let backup = self.backup_current()?;
        let current = self.current_dir();
        std::fs::remove_dir_all(&current)?;
        copy_dir_all(&version.snapshot_location, &current)?;

        metadata.last_rollback = Some(RollbackRecord {
            version_id: version.id.clone(),
            rolled_back_at: Utc::now(),
            backup_location: backup,
        });
        metadata.last_update = Some(Utc::now());
        self.persist_metadata(&metadata)?;
        Ok(())
    }

    /// Delete versions older than the cutoff, returning how many went away.
    pub fn cleanup_old_versions(&self, days_to_keep: u64) -> BaselineResult<usize> {
        let mut metadata = self.load_metadata()?;
        let cutoff = Utc::now() - chrono::Duration::days(days_to_keep as i64);

        let (old, keep): (Vec<_>, Vec<_>) = metadata
            .versions
            .drain(..)
            .partition(|v| v.created_at < cutoff);

        for version in &old {
            if version.snapshot_location.exists() {
                std::fs::remove_dir_all(&version.snapshot_location)?;
            }
        }

        let removed = old.len();
        metadata.versions = keep;
        if removed > 0 {
            self.persist_metadata(&metadata)?;
        }
        Ok(removed)
    }
}

/// A name is safe to join under `current/` only when it is a single
/// normal path component. Separators and `..` would reach outside it.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

/// Best-effort git query, "unknown" when git or the repo is unavailable.
fn git_query(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn git_branch() -> String {
    git_query(&["rev-parse", "--abbrev-ref", "HEAD"])
}

fn git_revision() -> String {
    git_query(&["rev-parse", "--short", "HEAD"])
}
