//! Vision model analysis of captures and diffs.
//!
//! Provides the analyzer collaborator consumed by the capture orchestrator
//! and the comparison runner:
//! - Connection health checks before any analysis round
//! - Screenshot and difference analysis through an OpenAI-compatible
//!   vision endpoint
//! - CSS fix suggestions derived from a difference analysis
//!
//! The core must never fail because this collaborator is absent: every
//! entry point degrades to an inert "analysis disabled" response when the
//! endpoint is unreachable or misbehaves.
//!
//! # Configuration
//!
//! Analyzer settings come from environment variables:
//! - `WEB_VISION_VLM_ENDPOINT`: API endpoint URL
//! - `WEB_VISION_VLM_MODEL`: Model name
//! - `WEB_VISION_VLM_MAX_TOKENS`: Max tokens in response
//! - `WEB_VISION_VLM_TIMEOUT`: Request timeout (seconds)
//! - `WEB_VISION_VLM_CONNECT_TIMEOUT`: Connection timeout (seconds)

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

use crate::config;

/// Fixed summary used whenever analysis is unavailable.
pub const ANALYSIS_DISABLED: &str = "analysis disabled";

/// Heuristic assessment of one screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotAnalysis {
    /// Free-form summary of the page state
    pub summary: String,

    /// Detected issues, possibly empty
    pub issues: Vec<String>,

    /// Confidence/quality score in [0, 1]
    pub score: f32,
}

impl ScreenshotAnalysis {
    /// The inert response used when analysis is unavailable.
    pub fn disabled() -> Self {
        Self {
            summary: ANALYSIS_DISABLED.to_string(),
            issues: Vec::new(),
            score: 0.0,
        }
    }
}

/// Severity of a visual difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

/// Heuristic assessment of one failing pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferenceAnalysis {
    /// Free-form summary of what changed
    pub summary: String,

    /// How serious the change looks
    pub severity: Severity,

    /// Page regions the change affects
    pub affected_areas: Vec<String>,
}

impl DifferenceAnalysis {
    /// The inert response used when analysis is unavailable.
    pub fn disabled() -> Self {
        Self {
            summary: ANALYSIS_DISABLED.to_string(),
            severity: Severity::None,
            affected_areas: Vec::new(),
        }
    }
}

/// Analyzer collaborator consumed around captures and comparisons.
///
/// Implementations must be infallible at this boundary: transport or
/// endpoint failures degrade to the inert responses instead of erroring.
pub trait Analyzer {
    /// Assess a single screenshot
    fn analyze_screenshot(&self, path: &Path) -> ScreenshotAnalysis;

    /// Assess a failing before/after pair and its diff raster
    fn analyze_difference(&self, before: &Path, after: &Path, diff: &Path) -> DifferenceAnalysis;

    /// Suggest CSS fixes for an analyzed difference
    fn suggest_css_fixes(&self, analysis: &DifferenceAnalysis) -> Vec<String>;

    /// Whether real analysis is available right now
    fn is_enabled(&self) -> bool;
}

/// Analyzer that always returns the inert responses.
#[derive(Debug, Default)]
pub struct DisabledAnalyzer;

impl Analyzer for DisabledAnalyzer {
    fn analyze_screenshot(&self, _path: &Path) -> ScreenshotAnalysis {
        ScreenshotAnalysis::disabled()
    }

    fn analyze_difference(&self, _before: &Path, _after: &Path, _diff: &Path) -> DifferenceAnalysis {
        DifferenceAnalysis::disabled()
    }

    fn suggest_css_fixes(&self, _analysis: &DifferenceAnalysis) -> Vec<String> {
        Vec::new()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Configuration for the VLM-backed analyzer
#[derive(Debug, Clone)]
pub struct VlmConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name to use
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Timeout for initial connection (seconds)
    pub connection_timeout: u64,
    /// Timeout for the whole request (seconds)
    pub request_timeout: u64,
}

impl Default for VlmConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            endpoint: cfg.vlm.endpoint.clone(),
            model: cfg.vlm.model.clone(),
            max_tokens: cfg.vlm.max_tokens,
            connection_timeout: cfg.vlm.connect_timeout,
            request_timeout: cfg.vlm.request_timeout,
        }
    }
}

impl VlmConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Check if an analyzer endpoint is reachable (connection-only check).
///
/// This only verifies the server accepts connections - it doesn't wait for
/// a full response since vision requests can take 30+ seconds.
pub fn check_health(endpoint: &str, timeout_secs: u64) -> bool {
    let url = endpoint
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    let host_port = url.split('/').next().unwrap_or("127.0.0.1:8080");

    let output = Command::new("curl")
        .args([
            "-s",
            "-o",
            "/dev/null",
            "-w",
            "%{http_code}",
            "--connect-timeout",
            &timeout_secs.to_string(),
            "--max-time",
            &timeout_secs.to_string(),
            "-I",
            &format!("http://{}", host_port),
        ])
        .output();

    match output {
        Ok(out) => {
            // Any response (even 4xx/5xx) means the server is reachable;
            // 000 means the connection failed entirely.
            let status = String::from_utf8_lossy(&out.stdout);
            status.trim().parse::<u16>().map(|c| c > 0).unwrap_or(false)
        }
        Err(_) => false,
    }
}

/// VLM-backed analyzer. Degrades to the inert responses on any failure.
pub struct VlmAnalyzer {
    config: VlmConfig,
}

impl VlmAnalyzer {
    pub fn new(config: VlmConfig) -> Self {
        Self { config }
    }

    /// Analyzer against the configured default endpoint.
    pub fn from_env() -> Self {
        Self::new(VlmConfig::default())
    }

    /// Send one image+prompt request; None on any transport/parse failure.
    fn request(&self, image_paths: &[&Path], prompt: &str) -> Option<String> {
        let mut content = Vec::new();
        for path in image_paths {
            let data = std::fs::read(path).ok()?;
            let img_base64 = base64::engine::general_purpose::STANDARD.encode(&data);
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/png;base64,{}", img_base64)
                }
            }));
        }
        content.push(serde_json::json!({
            "type": "text",
            "text": prompt
        }));

        let request = serde_json::json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": content
            }],
            "max_tokens": self.config.max_tokens
        });

        let request_json = serde_json::to_string(&request).ok()?;

        let output = Command::new("curl")
            .args([
                "-s",
                "-X",
                "POST",
                &self.config.endpoint,
                "-H",
                "Content-Type: application/json",
                "-d",
                &request_json,
                "--connect-timeout",
                &self.config.connection_timeout.to_string(),
                "--max-time",
                &self.config.request_timeout.to_string(),
            ])
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let response: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            // Thinking models put text in reasoning_content instead.
            .or_else(|| response["choices"][0]["message"]["reasoning_content"].as_str())?;

        Some(content.to_string())
    }
}

impl Analyzer for VlmAnalyzer {
    fn analyze_screenshot(&self, path: &Path) -> ScreenshotAnalysis {
        let prompt = "Describe this web page screenshot. List any visual issues \
                      (overlapping elements, clipped text, broken layout) one per line \
                      after the summary.";
        match self.request(&[path], prompt) {
            Some(text) => {
                let mut lines = text.lines();
                let summary = lines.next().unwrap_or(&text).to_string();
                let issues: Vec<String> = lines
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| l.trim().to_string())
                    .collect();
                let score = if issues.is_empty() { 1.0 } else { 0.5 };
                ScreenshotAnalysis {
                    summary,
                    issues,
                    score,
                }
            }
            None => ScreenshotAnalysis::disabled(),
        }
    }

    fn analyze_difference(&self, before: &Path, after: &Path, diff: &Path) -> DifferenceAnalysis {
        let prompt = "These are before/after screenshots of the same page plus a diff \
                      raster with differing pixels in red. Summarize what changed, then \
                      name the affected page areas one per line.";
        match self.request(&[before, after, diff], prompt) {
            Some(text) => {
                let mut lines = text.lines();
                let summary = lines.next().unwrap_or(&text).to_string();
                let affected_areas: Vec<String> = lines
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| l.trim().to_string())
                    .collect();
                let severity = if affected_areas.len() > 2 {
                    Severity::High
                } else if affected_areas.is_empty() {
                    Severity::Low
                } else {
                    Severity::Medium
                };
                DifferenceAnalysis {
                    summary,
                    severity,
                    affected_areas,
                }
            }
            None => DifferenceAnalysis::disabled(),
        }
    }

    fn suggest_css_fixes(&self, analysis: &DifferenceAnalysis) -> Vec<String> {
        if analysis.summary == ANALYSIS_DISABLED {
            return Vec::new();
        }
        let prompt = format!(
            "A visual regression was described as: {}. Affected areas: {}. \
             Suggest CSS fixes, one rule per line, no commentary.",
            analysis.summary,
            analysis.affected_areas.join(", ")
        );
        match self.request(&[], &prompt) {
            Some(text) => text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    fn is_enabled(&self) -> bool {
        check_health(&self.config.endpoint, self.config.connection_timeout.min(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_disabled_analyzer_is_inert() {
        let analyzer = DisabledAnalyzer;
        let path = PathBuf::from("/nonexistent.png");
        assert_eq!(analyzer.analyze_screenshot(&path).summary, ANALYSIS_DISABLED);
        let diff = analyzer.analyze_difference(&path, &path, &path);
        assert_eq!(diff.severity, Severity::None);
        assert!(analyzer.suggest_css_fixes(&diff).is_empty());
        assert!(!analyzer.is_enabled());
    }

    #[test]
    fn test_vlm_analyzer_degrades_without_endpoint() {
        // Port 9 (discard) is never an HTTP endpoint; every call must
        // degrade rather than error.
        let analyzer = VlmAnalyzer::new(VlmConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            model: "test".to_string(),
            max_tokens: 10,
            connection_timeout: 1,
            request_timeout: 1,
        });
        let path = PathBuf::from("/nonexistent.png");
        assert_eq!(analyzer.analyze_screenshot(&path).summary, ANALYSIS_DISABLED);
        assert_eq!(
            analyzer.analyze_difference(&path, &path, &path).summary,
            ANALYSIS_DISABLED
        );
    }

    #[test]
    fn test_css_fixes_skip_disabled_analysis() {
        let analyzer = VlmAnalyzer::new(VlmConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            model: "test".to_string(),
            max_tokens: 10,
            connection_timeout: 1,
            request_timeout: 1,
        });
        let fixes = analyzer.suggest_css_fixes(&DifferenceAnalysis::disabled());
        assert!(fixes.is_empty());
    }

    #[test]
    fn test_vlm_config_builder() {
        let config = VlmConfig::new("http://localhost:8080")
            .model("llava")
            .max_tokens(200);
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.model, "llava");
        assert_eq!(config.max_tokens, 200);
    }
}
