//! Per-pixel raster comparison.
//!
//! Comparison is exact-dimension only: rasters of different sizes are
//! maximal difference by definition, with no resizing or alignment. A pixel
//! counts as differing when any channel deviates by more than a fixed
//! internal sensitivity constant; the caller's `threshold` applies only to
//! the aggregate ratio. The diff raster is written whenever a pixel
//! comparison runs, pass or fail, so the side effects are uniform.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-channel sensitivity: a channel delta at or below this is noise.
/// Distinct from the caller's pass/fail threshold.
const CHANNEL_EPSILON: u8 = 16;

/// Result type for diff operations
pub type DiffOutcome<T> = Result<T, DiffError>;

/// Error types for diff operations
#[derive(Debug)]
pub enum DiffError {
    /// I/O error
    Io(std::io::Error),

    /// Raster decode/encode error
    Image(String),
}

impl std::fmt::Display for DiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffError::Io(err) => write!(f, "I/O error: {}", err),
            DiffError::Image(msg) => write!(f, "Image error: {}", msg),
        }
    }
}

impl std::error::Error for DiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiffError::Io(err) => Some(err),
            DiffError::Image(_) => None,
        }
    }
}

impl From<std::io::Error> for DiffError {
    fn from(err: std::io::Error) -> Self {
        DiffError::Io(err)
    }
}

impl From<image::ImageError> for DiffError {
    fn from(err: image::ImageError) -> Self {
        DiffError::Image(err.to_string())
    }
}

/// Outcome of one pixel comparison. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    /// Fraction of pixels classified differing, in [0, 1]
    pub difference_ratio: f64,

    /// True when the rasters had different dimensions
    pub dimension_mismatch: bool,

    /// Where the diff raster was (or would have been) written
    pub diff_artifact_path: PathBuf,

    /// Whether the ratio stayed within the caller's threshold
    pub passed: bool,
}

/// Compare two rasters pixel-by-pixel and write a diff raster.
///
/// Dimension mismatch short-circuits to maximal difference
/// (`difference_ratio == 1.0`, `passed == false`) without writing a raster.
/// Otherwise the diff raster marks differing pixels in red over a dimmed
/// copy of the first input, `difference_ratio = differing / total`, and
/// `passed = difference_ratio <= threshold`.
pub fn diff_images(
    path_a: &Path,
    path_b: &Path,
    diff_path: &Path,
    threshold: f64,
) -> DiffOutcome<DiffResult> {
    let img_a = image::open(path_a)
        .map_err(|e| DiffError::Image(format!("Failed to open {}: {}", path_a.display(), e)))?
        .to_rgb8();
    let img_b = image::open(path_b)
        .map_err(|e| DiffError::Image(format!("Failed to open {}: {}", path_b.display(), e)))?
        .to_rgb8();

    if img_a.dimensions() != img_b.dimensions() {
        return Ok(DiffResult {
            difference_ratio: 1.0,
            dimension_mismatch: true,
            diff_artifact_path: diff_path.to_path_buf(),
            passed: false,
        });
    }

    let (width, height) = img_a.dimensions();
    let mut diff_img: RgbImage = RgbImage::new(width, height);
    let mut differing: u64 = 0;

    for y in 0..height {
        for x in 0..width {
            let pa = img_a.get_pixel(x, y);
            let pb = img_b.get_pixel(x, y);
            if pixels_differ(pa.0, pb.0) {
                differing += 1;
                diff_img.put_pixel(x, y, image::Rgb([255, 0, 0]));
            } else {
                // Dimmed grayscale of the base image keeps context visible.
                let gray = (u16::from(pa.0[0]) + u16::from(pa.0[1]) + u16::from(pa.0[2])) / 6;
                let g = gray as u8;
                diff_img.put_pixel(x, y, image::Rgb([g, g, g]));
            }
        }
    }

    if let Some(parent) = diff_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    diff_img.save(diff_path)?;

    let total = u64::from(width) * u64::from(height);
    let difference_ratio = if total == 0 {
        0.0
    } else {
        differing as f64 / total as f64
    };

    Ok(DiffResult {
        difference_ratio,
        dimension_mismatch: false,
        diff_artifact_path: diff_path.to_path_buf(),
        passed: difference_ratio <= threshold,
    })
}

/// A pixel differs when any channel deviates beyond the sensitivity constant.
fn pixels_differ(a: [u8; 3], b: [u8; 3]) -> bool {
    for channel in 0..3 {
        let delta = i16::from(a[channel]) - i16::from(b[channel]);
        if delta.unsigned_abs() as u8 > CHANNEL_EPSILON {
            return true;
        }
    }
    false
}
