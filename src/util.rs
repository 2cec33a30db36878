//! Shared helpers for filenames, timestamps and snapshot directories.

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Fallback token for names that sanitize down to nothing.
pub const UNNAMED: &str = "unnamed";

/// Sanitize a user- or config-supplied name for use in filesystem paths.
///
/// Keeps only `[A-Za-z0-9_-]` and strips everything else, so the output can
/// never contain `/`, `\` or `..`. Empty input (or input that strips down to
/// nothing) yields the fixed `"unnamed"` token. Every viewport, device,
/// branch and version name goes through here before touching a path.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        UNNAMED.to_string()
    } else {
        cleaned
    }
}

/// Generate a timestamp string in YYYYMMDD_HHMMSS format
pub fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// List PNG files in a directory, sorted by filename.
///
/// Sorting keeps downstream aggregates independent of filesystem listing
/// order. A missing directory is an empty listing, not an error.
pub fn list_png_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// List PNG filenames (not paths) in a directory, sorted.
pub fn list_png_names(dir: &Path) -> io::Result<Vec<String>> {
    Ok(list_png_files(dir)?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect())
}

/// Recursively copy a directory tree, creating the destination as needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_name("iphone-12_pro"), "iphone-12_pro");
        assert_eq!(sanitize_name("Desktop HD"), "DesktopHD");
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(sanitize_name("../../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_name("a/b\\c"), "abc");
        let out = sanitize_name("..\\..\\windows");
        assert!(!out.contains('.'));
        assert!(!out.contains('\\'));
    }

    #[test]
    fn test_sanitize_empty_yields_default() {
        assert_eq!(sanitize_name(""), UNNAMED);
        assert_eq!(sanitize_name("///"), UNNAMED);
        assert_eq!(sanitize_name("..."), UNNAMED);
    }

    #[test]
    fn test_list_png_missing_dir() {
        let files = list_png_files(Path::new("/nonexistent/web-vision-test")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_copy_dir_all() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("sub")).unwrap();
        fs::write(src.path().join("a.png"), b"x").unwrap();
        fs::write(src.path().join("sub/b.png"), b"y").unwrap();

        let target = dst.path().join("copy");
        copy_dir_all(src.path(), &target).unwrap();
        assert!(target.join("a.png").exists());
        assert!(target.join("sub/b.png").exists());
    }
}
