//! End-to-end directory comparison over real PNG files.

use image::{Rgb, RgbImage};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

use web_vision::compare::{compare_directories, CompareOptions};
use web_vision::report::{render, ReportFormat};

fn write_solid(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    img.save(path).unwrap();
}

/// Image whose left half is black and right half is white.
fn write_half_split(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    });
    img.save(path).unwrap();
}

#[test]
fn test_compare_directories_end_to_end() {
    let before = TempDir::new().unwrap();
    let after = TempDir::new().unwrap();

    // a.png identical in both sets; b.png differs in half its pixels.
    write_solid(&before.path().join("a.png"), 64, 64, [10, 20, 30]);
    write_solid(&after.path().join("a.png"), 64, 64, [10, 20, 30]);
    write_solid(&before.path().join("b.png"), 64, 64, [0, 0, 0]);
    write_half_split(&after.path().join("b.png"), 64, 64);

    let options = CompareOptions {
        threshold: 0.1,
        ..Default::default()
    };
    let report = compare_directories(before.path(), after.path(), &options, None).unwrap();

    assert!(!report.passed);
    assert_eq!(report.total_images, 2);
    assert_eq!(report.differences.len(), 1);

    let entry = &report.differences[0];
    assert_eq!(entry.file, "b.png");
    assert!(!entry.dimension_mismatch);
    assert!((entry.difference - 0.5).abs() < 0.02);
    assert!(entry.diff_path.is_file());

    assert!(report.report["a.png"].passed);
    assert!(!report.report["b.png"].passed);
    assert!(report.skipped_only_in_a.is_empty());
    assert!(report.skipped_only_in_b.is_empty());
}

#[test]
fn test_compare_passes_with_generous_threshold() {
    let before = TempDir::new().unwrap();
    let after = TempDir::new().unwrap();

    write_solid(&before.path().join("a.png"), 32, 32, [0, 0, 0]);
    write_half_split(&after.path().join("a.png"), 32, 32);

    let options = CompareOptions {
        threshold: 0.6,
        ..Default::default()
    };
    let report = compare_directories(before.path(), after.path(), &options, None).unwrap();

    assert!(report.passed);
    assert!(report.differences.is_empty());
    // The diff raster is still produced for passing comparisons.
    assert!(after.path().join("diffs").join("diff_a.png").is_file());
}

#[test]
fn test_one_sided_files_are_skipped_not_failed() {
    let before = TempDir::new().unwrap();
    let after = TempDir::new().unwrap();

    write_solid(&before.path().join("shared.png"), 16, 16, [5, 5, 5]);
    write_solid(&after.path().join("shared.png"), 16, 16, [5, 5, 5]);
    write_solid(&before.path().join("removed.png"), 16, 16, [5, 5, 5]);
    write_solid(&after.path().join("added.png"), 16, 16, [5, 5, 5]);

    let report =
        compare_directories(before.path(), after.path(), &CompareOptions::default(), None).unwrap();

    assert!(report.passed);
    assert_eq!(report.total_images, 1);
    assert_eq!(report.skipped_only_in_a, vec!["removed.png".to_string()]);
    assert_eq!(report.skipped_only_in_b, vec!["added.png".to_string()]);
}

#[test]
fn test_rendered_reports_cover_all_formats() {
    let before = TempDir::new().unwrap();
    let after = TempDir::new().unwrap();

    write_solid(&before.path().join("page.png"), 16, 16, [0, 0, 0]);
    write_half_split(&after.path().join("page.png"), 16, 16);

    let options = CompareOptions {
        threshold: 0.1,
        ..Default::default()
    };
    let report = compare_directories(before.path(), after.path(), &options, None).unwrap();

    let text = render(&report, ReportFormat::Text);
    assert!(text.contains("FAILED"));
    assert!(text.contains("page.png"));

    let html = render(&report, ReportFormat::Html);
    assert!(html.contains("<table>"));

    let csv = render(&report, ReportFormat::Csv);
    assert!(csv.lines().count() >= 2);

    let json = render(&report, ReportFormat::Json);
    let parsed: web_vision::compare::ComparisonReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.total_images, report.total_images);
}
