//! Report rendering for comparison results.
//!
//! Pure functions from a [`ComparisonReport`] to text in several output
//! formats. Rendering never touches the filesystem; callers decide where
//! the output goes.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::compare::ComparisonReport;

/// Output format for rendered reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Html,
    Markdown,
    Csv,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            "markdown" | "md" => Ok(Self::Markdown),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

/// Render a comparison report in the requested format.
pub fn render(report: &ComparisonReport, format: ReportFormat) -> String {
    match format {
        ReportFormat::Text => render_text(report),
        ReportFormat::Json => render_json(report),
        ReportFormat::Html => render_html(report),
        ReportFormat::Markdown => render_markdown(report),
        ReportFormat::Csv => render_csv(report),
    }
}

/// Plain-text summary suitable for terminal output.
pub fn render_text(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let status = if report.passed { "PASSED" } else { "FAILED" };
    let _ = writeln!(out, "Comparison {}", status);
    let _ = writeln!(
        out,
        "  {} images compared, {} differ",
        report.total_images,
        report.differences.len()
    );
    for entry in &report.differences {
        let _ = writeln!(
            out,
            "  {} differs by {:.2}%{}",
            entry.file,
            entry.difference * 100.0,
            if entry.dimension_mismatch {
                " (dimension mismatch)"
            } else {
                ""
            }
        );
        let _ = writeln!(out, "    diff: {}", entry.diff_path.display());
        if let Some(analysis) = &entry.analysis {
            let _ = writeln!(out, "    analysis: {}", analysis.summary);
        }
        for fix in &entry.css_suggestions {
            let _ = writeln!(out, "    fix: {}", fix);
        }
    }
    for (file, file_report) in &report.report {
        if let Some(err) = &file_report.error {
            let _ = writeln!(out, "  {} could not be compared: {}", file, err);
        }
    }
    if !report.skipped_only_in_a.is_empty() {
        let _ = writeln!(
            out,
            "  only in first set: {}",
            report.skipped_only_in_a.join(", ")
        );
    }
    if !report.skipped_only_in_b.is_empty() {
        let _ = writeln!(
            out,
            "  only in second set: {}",
            report.skipped_only_in_b.join(", ")
        );
    }
    out
}

/// Machine-readable JSON of the full report.
pub fn render_json(report: &ComparisonReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

/// Minimal escaping for text interpolated into HTML.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standalone HTML page with a per-file result table.
pub fn render_html(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let status = if report.passed { "passed" } else { "failed" };
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Visual comparison report</title>\n");
    out.push_str("<style>\n");
    out.push_str("body { font-family: sans-serif; margin: 2em; }\n");
    out.push_str("table { border-collapse: collapse; }\n");
    out.push_str("th, td { border: 1px solid #ccc; padding: 0.4em 0.8em; text-align: left; }\n");
    out.push_str(".passed { color: #2e7d32; }\n.failed { color: #c62828; }\n");
    out.push_str("</style>\n</head>\n<body>\n");
    let _ = writeln!(
        out,
        "<h1>Visual comparison <span class=\"{}\">{}</span></h1>",
        status,
        status.to_uppercase()
    );
    let _ = writeln!(
        out,
        "<p>{} images compared, {} differ.</p>",
        report.total_images,
        report.differences.len()
    );
    out.push_str("<table>\n<tr><th>File</th><th>Difference</th><th>Status</th></tr>\n");
    for (file, file_report) in &report.report {
        let status = if let Some(err) = &file_report.error {
            format!("error: {}", html_escape(err))
        } else if file_report.passed {
            "passed".to_string()
        } else {
            "failed".to_string()
        };
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{:.2}%</td><td>{}</td></tr>",
            html_escape(file),
            file_report.difference * 100.0,
            status
        );
    }
    out.push_str("</table>\n");
    if !report.differences.is_empty() {
        out.push_str("<h2>Differences</h2>\n<ul>\n");
        for entry in &report.differences {
            let _ = write!(
                out,
                "<li><strong>{}</strong>: {:.2}%",
                html_escape(&entry.file),
                entry.difference * 100.0
            );
            if let Some(analysis) = &entry.analysis {
                let _ = write!(out, " &mdash; {}", html_escape(&analysis.summary));
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

/// Markdown summary with a per-file table.
pub fn render_markdown(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let status = if report.passed { "PASSED" } else { "FAILED" };
    let _ = writeln!(out, "# Visual comparison: {}\n", status);
    let _ = writeln!(
        out,
        "{} images compared, {} differ.\n",
        report.total_images,
        report.differences.len()
    );
    out.push_str("| File | Difference | Status |\n");
    out.push_str("|------|-----------:|--------|\n");
    for (file, file_report) in &report.report {
        let status = if let Some(err) = &file_report.error {
            format!("error: {}", err)
        } else if file_report.passed {
            "passed".to_string()
        } else {
            "failed".to_string()
        };
        let _ = writeln!(
            out,
            "| {} | {:.2}% | {} |",
            file,
            file_report.difference * 100.0,
            status
        );
    }
    for entry in &report.differences {
        if let Some(analysis) = &entry.analysis {
            let _ = writeln!(out, "\n**{}**: {}", entry.file, analysis.summary);
            for fix in &entry.css_suggestions {
                let _ = writeln!(out, "- `{}`", fix);
            }
        }
    }
    out
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One row per compared file: name, difference ratio, status.
pub fn render_csv(report: &ComparisonReport) -> String {
    let mut out = String::from("file,difference,status\n");
    for (file, file_report) in &report.report {
        let status = if let Some(err) = &file_report.error {
            format!("error: {}", err)
        } else if file_report.passed {
            "passed".to_string()
        } else {
            "failed".to_string()
        };
        let _ = writeln!(
            out,
            "{},{:.6},{}",
            csv_field(file),
            file_report.difference,
            csv_field(&status)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{DiffEntry, FileReport};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn sample_report() -> ComparisonReport {
        let mut files = BTreeMap::new();
        files.insert(
            "header.png".to_string(),
            FileReport {
                difference: 0.0,
                passed: true,
                error: None,
            },
        );
        files.insert(
            "footer.png".to_string(),
            FileReport {
                difference: 0.42,
                passed: false,
                error: None,
            },
        );
        ComparisonReport {
            passed: false,
            total_images: 2,
            differences: vec![DiffEntry {
                file: "footer.png".to_string(),
                difference: 0.42,
                dimension_mismatch: false,
                diff_path: PathBuf::from("/tmp/diffs/footer.png"),
                analysis: None,
                css_suggestions: Vec::new(),
            }],
            report: files,
            skipped_only_in_a: vec!["old.png".to_string()],
            skipped_only_in_b: Vec::new(),
        }
    }

    #[test]
    fn test_text_lists_failures_and_skips() {
        let text = render_text(&sample_report());
        assert!(text.contains("Comparison FAILED"));
        assert!(text.contains("footer.png differs by 42.00%"));
        assert!(text.contains("only in first set: old.png"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = render_json(&sample_report());
        let parsed: ComparisonReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_images, 2);
        assert_eq!(parsed.differences.len(), 1);
    }

    #[test]
    fn test_html_escapes_file_names() {
        let mut report = sample_report();
        report.report.insert(
            "a<b>.png".to_string(),
            FileReport {
                difference: 0.0,
                passed: true,
                error: None,
            },
        );
        let html = render_html(&report);
        assert!(html.contains("a&lt;b&gt;.png"));
        assert!(!html.contains("<b>.png"));
    }

    #[test]
    fn test_csv_quotes_commas() {
        let mut report = sample_report();
        report.report.insert(
            "a,b.png".to_string(),
            FileReport {
                difference: 0.0,
                passed: true,
                error: None,
            },
        );
        let csv = render_csv(&report);
        assert!(csv.contains("\"a,b.png\""));
        assert!(csv.starts_with("file,difference,status\n"));
    }

    #[test]
    fn test_markdown_has_table_header() {
        let md = render_markdown(&sample_report());
        assert!(md.contains("| File | Difference | Status |"));
        assert!(md.contains("| footer.png | 42.00% | failed |"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }
}
