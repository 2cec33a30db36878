//! Session management for organized temporary file handling.
//!
//! Provides centralized management of capture sessions with:
//! - Unique session directories under a configurable base location
//! - Automatic cleanup unless explicitly preserved
//! - Session metadata tracking

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config;
use crate::util::{generate_timestamp, sanitize_name};

fn session_base_dir() -> PathBuf {
    PathBuf::from(&config::get().session.base_dir)
}

/// A capture session with organized file management
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Root directory for this session
    pub dir: PathBuf,
    /// Whether to keep files after session ends
    pub keep: bool,
}

impl Session {
    /// Create a new session with a unique ID
    pub fn new() -> Self {
        let id = generate_session_id();
        let dir = session_base_dir().join(&id);

        Self {
            id,
            dir,
            keep: false,
        }
    }

    /// Create a session with a specific name/prefix
    pub fn with_name(name: &str) -> Self {
        let id = format!("{}_{}", sanitize_name(name), generate_timestamp());
        let dir = session_base_dir().join(&id);

        Self {
            id,
            dir,
            keep: false,
        }
    }

    /// Create a session in a specific directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(generate_session_id);

        Self {
            id,
            dir,
            // User-specified directories are kept by default
            keep: true,
        }
    }

    /// Set whether to keep files after session ends
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Initialize the session directory
    pub fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_path = self.dir.join(".session.json");
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        Ok(())
    }

    /// Get path for a single capture file
    pub fn capture_path(&self, name: &str) -> PathBuf {
        let filename = format!("{}.png", sanitize_name(name));
        self.dir.join(filename)
    }

    /// List all PNG files in the session
    pub fn list_captures(&self) -> std::io::Result<Vec<PathBuf>> {
        crate::util::list_png_files(&self.dir)
    }

    /// Clean up the session directory
    pub fn cleanup(&self) -> std::io::Result<()> {
        if self.dir.exists() && !self.keep {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("session_{}_{}", timestamp, pid)
}

/// Clean up old sessions older than the specified duration
pub fn cleanup_old_sessions(max_age: std::time::Duration) -> std::io::Result<usize> {
    let base = session_base_dir();
    if !base.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut cleaned = 0;

    for entry in fs::read_dir(&base)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            if let Ok(metadata) = entry.metadata() {
                if let Ok(modified) = metadata.modified() {
                    if let Ok(age) = now.duration_since(modified) {
                        if age > max_age && fs::remove_dir_all(&path).is_ok() {
                            cleaned += 1;
                        }
                    }
                }
            }
        }
    }

    Ok(cleaned)
}

/// List all existing sessions
pub fn list_sessions() -> std::io::Result<Vec<PathBuf>> {
    let base = session_base_dir();
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(&base)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            sessions.push(path);
        }
    }
    sessions.sort();
    Ok(sessions)
}
