// Core types for page capture across engines and render profiles.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analyze::ScreenshotAnalysis;

/// Rendering/automation backend driving a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Chromium,
    Firefox,
    Webkit,
}

impl EngineType {
    /// Lowercase identifier used in filenames and CLI arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Chromium => "chromium",
            EngineType::Firefox => "firefox",
            EngineType::Webkit => "webkit",
        }
    }

    /// Parse a CLI-supplied engine name.
    pub fn from_str(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "chromium" | "chrome" => Some(EngineType::Chromium),
            "firefox" => Some(EngineType::Firefox),
            "webkit" => Some(EngineType::Webkit),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named viewport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportSpec {
    /// Name of the viewport (e.g., "desktop", "tablet")
    pub name: String,

    /// Width in CSS pixels
    pub width: u32,

    /// Height in CSS pixels
    pub height: u32,

    /// Device pixel ratio
    #[serde(default = "default_pixel_density")]
    pub pixel_density: f32,
}

fn default_pixel_density() -> f32 {
    1.0
}

impl ViewportSpec {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            pixel_density: 1.0,
        }
    }

    /// Parse a "WxH" viewport string (e.g., "1280x720").
    pub fn from_dimensions_str(name: &str, dims: &str) -> Option<Self> {
        let parts: Vec<&str> = dims.split('x').collect();
        if parts.len() != 2 {
            return None;
        }
        let width = parts[0].parse().ok()?;
        let height = parts[1].parse().ok()?;
        Some(Self::new(name, width, height))
    }
}

/// An emulated device: a viewport plus identity hints for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceProfile {
    /// Device name (e.g., "iphone-12")
    pub name: String,

    /// Viewport width in CSS pixels
    pub width: u32,

    /// Viewport height in CSS pixels
    pub height: u32,

    /// Device pixel ratio
    pub pixel_density: f32,

    /// User agent string the engine should present
    pub user_agent: String,

    /// Whether touch/mobile emulation applies
    pub is_mobile: bool,
}

impl DeviceProfile {
    /// Look up a built-in device preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        let (width, height, density, ua, mobile) = match name.to_lowercase().as_str() {
            "iphone-12" => (390, 844, 3.0, "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15", true),
            "pixel-7" => (412, 915, 2.625, "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36", true),
            "ipad" => (810, 1080, 2.0, "Mozilla/5.0 (iPad; CPU OS 14_0 like Mac OS X) AppleWebKit/605.1.15", true),
            "desktop-hd" => (1920, 1080, 1.0, "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36", false),
            _ => return None,
        };
        Some(Self {
            name: name.to_lowercase(),
            width,
            height,
            pixel_density: density,
            user_agent: ua.to_string(),
            is_mobile: mobile,
        })
    }

    /// All built-in device presets.
    pub fn all_presets() -> Vec<Self> {
        ["iphone-12", "pixel-7", "ipad", "desktop-hd"]
            .iter()
            .filter_map(|n| Self::preset(n))
            .collect()
    }
}

/// Viewport-or-device profile a capture combination renders under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RenderProfile {
    Device(DeviceProfile),
    Viewport(ViewportSpec),
}

impl RenderProfile {
    /// Name of the underlying viewport or device (unsanitized).
    pub fn name(&self) -> &str {
        match self {
            RenderProfile::Viewport(v) => &v.name,
            RenderProfile::Device(d) => &d.name,
        }
    }

    /// Viewport dimensions in CSS pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            RenderProfile::Viewport(v) => (v.width, v.height),
            RenderProfile::Device(d) => (d.width, d.height),
        }
    }

    /// Device pixel ratio.
    pub fn pixel_density(&self) -> f32 {
        match self {
            RenderProfile::Viewport(v) => v.pixel_density,
            RenderProfile::Device(d) => d.pixel_density,
        }
    }
}

/// What to render: a URL or a local file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaptureSource {
    Url(String),
    File(PathBuf),
}

impl CaptureSource {
    /// Resolve to a navigable URL (local paths become file:// URLs).
    pub fn to_url(&self) -> String {
        match self {
            CaptureSource::Url(url) => url.clone(),
            CaptureSource::File(path) => {
                let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                format!("file://{}", absolute.display())
            }
        }
    }
}

/// One capture call: a source rendered under engine x profile combinations.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// URL or local path to render
    pub source: CaptureSource,

    /// Engines to drive, processed strictly sequentially
    pub engines: Vec<EngineType>,

    /// Viewports/devices rendered within each engine
    pub profiles: Vec<RenderProfile>,
}

/// Per-capture options. Unknown fields are rejected when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureOptions {
    /// Capture the full scrollable page instead of the viewport only
    #[serde(default)]
    pub full_page: bool,

    /// CSS selector to wait for after navigation
    #[serde(default)]
    pub wait_for_selector: Option<String>,

    /// Scripted interaction steps run before the screenshot
    #[serde(default)]
    pub interact: Vec<crate::capture::interact::InteractionStep>,

    /// Settle delay before extraction (ms)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Navigation timeout (ms)
    #[serde(default = "default_nav_timeout")]
    pub timeout_ms: u64,

    /// Forward each artifact to the analyzer collaborator
    #[serde(default)]
    pub analyze: bool,

    /// Retry attempts for transient capture failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_settle_delay() -> u64 {
    crate::config::DEFAULT_SETTLE_DELAY_MS
}

fn default_nav_timeout() -> u64 {
    crate::config::DEFAULT_NAV_TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    crate::config::DEFAULT_MAX_RETRIES
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            full_page: false,
            wait_for_selector: None,
            interact: Vec::new(),
            settle_delay_ms: default_settle_delay(),
            timeout_ms: default_nav_timeout(),
            analyze: false,
            max_retries: default_max_retries(),
        }
    }
}

/// One produced screenshot. Filenames derive from sanitized engine and
/// profile names, so re-running with the same names overwrites
/// deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureArtifact {
    /// Engine that rendered the page
    pub engine: EngineType,

    /// Sanitized viewport/device name
    pub profile_name: String,

    /// Path of the written raster
    pub file_path: PathBuf,

    /// URL the capture rendered
    pub source_url: String,

    /// Analyzer output, when requested and available
    pub analysis: Option<ScreenshotAnalysis>,
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations
#[derive(Debug)]
pub enum CaptureError {
    /// Denylisted interaction content; never retried
    Security(String),

    /// Engine/session fault (transient, retry-eligible)
    Engine(String),

    /// Navigation or wait deadline exceeded (transient, retry-eligible)
    Timeout(String),

    /// I/O error
    Io(std::io::Error),

    /// Raster decode/encode error
    Image(String),

    /// Retry budget exhausted; carries the final underlying message
    RetryExhausted { attempts: u32, message: String },
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Security(msg) => write!(f, "Security violation: {}", msg),
            CaptureError::Engine(msg) => write!(f, "Engine error: {}", msg),
            CaptureError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CaptureError::Io(err) => write!(f, "I/O error: {}", err),
            CaptureError::Image(msg) => write!(f, "Image error: {}", msg),
            CaptureError::RetryExhausted { attempts, message } => {
                write!(f, "Capture failed after {} attempts: {}", attempts, message)
            }
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Image(err.to_string())
    }
}

impl From<crate::retry::RetryError> for CaptureError {
    fn from(err: crate::retry::RetryError) -> Self {
        CaptureError::RetryExhausted {
            attempts: err.attempts,
            message: err.last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_type_parse() {
        assert_eq!(EngineType::from_str("chromium"), Some(EngineType::Chromium));
        assert_eq!(EngineType::from_str("Chrome"), Some(EngineType::Chromium));
        assert_eq!(EngineType::from_str("WEBKIT"), Some(EngineType::Webkit));
        assert_eq!(EngineType::from_str("opera"), None);
    }

    #[test]
    fn test_viewport_from_dimensions() {
        let vp = ViewportSpec::from_dimensions_str("custom", "1280x720").unwrap();
        assert_eq!(vp.width, 1280);
        assert_eq!(vp.height, 720);
        assert!(ViewportSpec::from_dimensions_str("bad", "1280").is_none());
    }

    #[test]
    fn test_device_presets() {
        let iphone = DeviceProfile::preset("iphone-12").unwrap();
        assert!(iphone.is_mobile);
        assert_eq!(iphone.width, 390);
        assert!(DeviceProfile::preset("nokia-3310").is_none());
        assert_eq!(DeviceProfile::all_presets().len(), 4);
    }

    #[test]
    fn test_capture_options_reject_unknown_fields() {
        let result: Result<CaptureOptions, _> =
            serde_json::from_str(r#"{"full_page": true, "resize": "cover"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_capture_options_defaults() {
        let opts: CaptureOptions = serde_json::from_str("{}").unwrap();
        assert!(!opts.full_page);
        assert_eq!(opts.settle_delay_ms, crate::config::DEFAULT_SETTLE_DELAY_MS);
        assert_eq!(opts.max_retries, crate::config::DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_file_source_to_url() {
        let source = CaptureSource::File(PathBuf::from("/tmp/page.html"));
        assert!(source.to_url().starts_with("file:///"));
    }
}
