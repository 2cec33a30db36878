//! Types for the baseline version store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Name of the durable metadata document under the baseline root.
pub const METADATA_FILE: &str = "metadata.json";

/// Pointer value for the default working snapshot.
pub const CURRENT: &str = "current";

/// An immutable named snapshot of the working baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineVersion {
    /// Globally unique id (`v_{millis}_{seq}`)
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// When the version was created
    pub created_at: DateTime<Utc>,

    /// Source-control branch at creation time ("unknown" when unavailable)
    pub source_control_branch: String,

    /// Source-control revision at creation time ("unknown" when unavailable)
    pub source_control_revision: String,

    /// Directory holding the snapshot files
    pub snapshot_location: PathBuf,
}

/// A switchable named snapshot derived from the working baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineBranch {
    /// Branch name (sanitized)
    pub name: String,

    /// When the branch was created
    pub created_at: DateTime<Utc>,

    /// Source-control branch at creation time
    pub source_control_branch: String,

    /// Pointer that was current when this branch was created
    pub parent: String,

    /// Directory holding the snapshot files
    pub snapshot_location: PathBuf,
}

/// Audit record of the most recent rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRecord {
    /// Version id that was restored
    pub version_id: String,

    /// When the rollback happened
    pub rolled_back_at: DateTime<Utc>,

    /// Backup location of the pre-rollback state
    pub backup_location: PathBuf,
}

/// The durable metadata document, persisted wholesale after each mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineMetadata {
    /// Versions in creation order
    pub versions: Vec<BaselineVersion>,

    /// Branches keyed by name
    pub branches: BTreeMap<String, BaselineBranch>,

    /// The branch name currently checked out, or "current"
    pub current_pointer: String,

    /// When the working baseline last changed
    pub last_update: Option<DateTime<Utc>>,

    /// Most recent rollback, if any
    pub last_rollback: Option<RollbackRecord>,
}

impl Default for BaselineMetadata {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
            branches: BTreeMap::new(),
            current_pointer: CURRENT.to_string(),
            last_update: None,
            last_rollback: None,
        }
    }
}

/// Errors from baseline store operations
#[derive(Debug)]
pub enum BaselineError {
    /// The named branch or version does not exist
    NotFound(String),
    /// A file name contained path separators or parent components
    InvalidName(String),
    /// Filesystem failure
    Io(std::io::Error),
    /// Metadata could not be read or written as JSON
    Serialization(serde_json::Error),
}

impl fmt::Display for BaselineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineError::NotFound(name) => write!(f, "Not found: {}", name),
            BaselineError::InvalidName(name) => write!(f, "Invalid file name: {}", name),
            BaselineError::Io(e) => write!(f, "IO error: {}", e),
            BaselineError::Serialization(e) => write!(f, "Metadata error: {}", e),
        }
    }
}

impl std::error::Error for BaselineError {}

impl From<std::io::Error> for BaselineError {
    fn from(e: std::io::Error) -> Self {
        BaselineError::Io(e)
    }
}

impl From<serde_json::Error> for BaselineError {
    fn from(e: serde_json::Error) -> Self {
        BaselineError::Serialization(e)
    }
}

/// Result type for baseline operations
pub type BaselineResult<T> = Result<T, BaselineError>;
