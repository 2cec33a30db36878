//! Configuration management with environment variable support.
//!
//! Centralized configuration for Web Vision, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults
//! - A cached global for shared access
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB_VISION_MAX_SESSIONS` | Max concurrent rendering sessions | `5` |
//! | `WEB_VISION_MEMORY_LIMIT_MB` | Memory pressure eviction threshold (MB) | `1024` |
//! | `WEB_VISION_NAV_TIMEOUT_MS` | Navigation timeout (ms) | `30000` |
//! | `WEB_VISION_SETTLE_DELAY_MS` | Post-interaction settle delay (ms) | `500` |
//! | `WEB_VISION_MAX_RETRIES` | Capture retry attempts | `2` |
//! | `WEB_VISION_RETRY_BASE_MS` | Retry backoff base delay (ms) | `1000` |
//! | `WEB_VISION_RETRY_MAX_MS` | Retry backoff cap (ms) | `10000` |
//! | `WEB_VISION_BASELINE_DIR` | Baseline store root directory | `./baseline` |
//! | `WEB_VISION_SESSION_DIR` | Base directory for capture sessions | `/tmp/web-vision` |
//! | `WEB_VISION_VLM_ENDPOINT` | Analyzer API endpoint URL | `http://127.0.0.1:8080/v1/chat/completions` |
//! | `WEB_VISION_VLM_MODEL` | Analyzer model name | `qwen3` |
//! | `WEB_VISION_VLM_MAX_TOKENS` | Maximum tokens in analyzer response | `400` |
//! | `WEB_VISION_VLM_TIMEOUT` | Analyzer request timeout (seconds) | `60` |
//! | `WEB_VISION_VLM_CONNECT_TIMEOUT` | Analyzer connection timeout (seconds) | `10` |

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default maximum concurrent rendering sessions
pub const DEFAULT_MAX_SESSIONS: usize = 5;

/// Default memory pressure threshold in megabytes
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 1024;

/// Default navigation timeout (milliseconds)
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

/// Default settle delay after navigation/interaction (milliseconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Default number of capture retries
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default retry backoff base delay (milliseconds)
pub const DEFAULT_RETRY_BASE_MS: u64 = 1000;

/// Default retry backoff cap (milliseconds)
pub const DEFAULT_RETRY_MAX_MS: u64 = 10_000;

/// Default baseline store root
pub const DEFAULT_BASELINE_DIR: &str = "./baseline";

/// Default session base directory
pub const DEFAULT_SESSION_DIR: &str = "/tmp/web-vision";

/// Default analyzer API endpoint
pub const DEFAULT_VLM_ENDPOINT: &str = "http://127.0.0.1:8080/v1/chat/completions";

/// Default analyzer model name
pub const DEFAULT_VLM_MODEL: &str = "qwen3";

/// Default max tokens for analyzer responses
pub const DEFAULT_VLM_MAX_TOKENS: u32 = 400;

/// Default analyzer connection timeout (seconds)
pub const DEFAULT_VLM_CONNECT_TIMEOUT: u64 = 10;

/// Default analyzer request timeout (seconds)
pub const DEFAULT_VLM_TIMEOUT: u64 = 60;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_MAX_SESSIONS: &str = "WEB_VISION_MAX_SESSIONS";
pub const ENV_MEMORY_LIMIT_MB: &str = "WEB_VISION_MEMORY_LIMIT_MB";
pub const ENV_NAV_TIMEOUT_MS: &str = "WEB_VISION_NAV_TIMEOUT_MS";
pub const ENV_SETTLE_DELAY_MS: &str = "WEB_VISION_SETTLE_DELAY_MS";
pub const ENV_MAX_RETRIES: &str = "WEB_VISION_MAX_RETRIES";
pub const ENV_RETRY_BASE_MS: &str = "WEB_VISION_RETRY_BASE_MS";
pub const ENV_RETRY_MAX_MS: &str = "WEB_VISION_RETRY_MAX_MS";
pub const ENV_BASELINE_DIR: &str = "WEB_VISION_BASELINE_DIR";
pub const ENV_SESSION_DIR: &str = "WEB_VISION_SESSION_DIR";
pub const ENV_VLM_ENDPOINT: &str = "WEB_VISION_VLM_ENDPOINT";
pub const ENV_VLM_MODEL: &str = "WEB_VISION_VLM_MODEL";
pub const ENV_VLM_MAX_TOKENS: &str = "WEB_VISION_VLM_MAX_TOKENS";
pub const ENV_VLM_CONNECT_TIMEOUT: &str = "WEB_VISION_VLM_CONNECT_TIMEOUT";
pub const ENV_VLM_TIMEOUT: &str = "WEB_VISION_VLM_TIMEOUT";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Web Vision
#[derive(Debug, Clone)]
pub struct Config {
    /// Capture and resource limits
    pub capture: CaptureSettings,
    /// Baseline store settings
    pub baseline: BaselineSettings,
    /// Session configuration
    pub session: SessionSettings,
    /// Analyzer (VLM) settings
    pub vlm: VlmSettings,
}

/// Capture-related settings
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Maximum concurrent rendering sessions
    pub max_sessions: usize,
    /// Memory pressure threshold (MB)
    pub memory_limit_mb: u64,
    /// Navigation timeout (ms)
    pub nav_timeout_ms: u64,
    /// Settle delay before screenshot extraction (ms)
    pub settle_delay_ms: u64,
    /// Retry attempts for transient capture failures
    pub max_retries: u32,
    /// Retry backoff base delay (ms)
    pub retry_base_ms: u64,
    /// Retry backoff cap (ms)
    pub retry_max_ms: u64,
}

/// Baseline store settings
#[derive(Debug, Clone)]
pub struct BaselineSettings {
    /// Root directory of the baseline store
    pub root_dir: String,
}

/// Session-related settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Base directory for session storage
    pub base_dir: String,
}

/// Analyzer (VLM) settings
#[derive(Debug, Clone)]
pub struct VlmSettings {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
    /// Request timeout (seconds)
    pub request_timeout: u64,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            capture: CaptureSettings::from_env(),
            baseline: BaselineSettings::from_env(),
            session: SessionSettings::from_env(),
            vlm: VlmSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            capture: CaptureSettings::defaults(),
            baseline: BaselineSettings::defaults(),
            session: SessionSettings::defaults(),
            vlm: VlmSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl CaptureSettings {
    /// Create capture settings from environment variables
    pub fn from_env() -> Self {
        Self {
            max_sessions: env_parse(ENV_MAX_SESSIONS, DEFAULT_MAX_SESSIONS),
            memory_limit_mb: env_parse(ENV_MEMORY_LIMIT_MB, DEFAULT_MEMORY_LIMIT_MB),
            nav_timeout_ms: env_parse(ENV_NAV_TIMEOUT_MS, DEFAULT_NAV_TIMEOUT_MS),
            settle_delay_ms: env_parse(ENV_SETTLE_DELAY_MS, DEFAULT_SETTLE_DELAY_MS),
            max_retries: env_parse(ENV_MAX_RETRIES, DEFAULT_MAX_RETRIES),
            retry_base_ms: env_parse(ENV_RETRY_BASE_MS, DEFAULT_RETRY_BASE_MS),
            retry_max_ms: env_parse(ENV_RETRY_MAX_MS, DEFAULT_RETRY_MAX_MS),
        }
    }

    /// Create capture settings with defaults
    pub fn defaults() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            nav_timeout_ms: DEFAULT_NAV_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
            retry_max_ms: DEFAULT_RETRY_MAX_MS,
        }
    }
}

impl BaselineSettings {
    /// Create baseline settings from environment variables
    pub fn from_env() -> Self {
        Self {
            root_dir: env::var(ENV_BASELINE_DIR)
                .unwrap_or_else(|_| DEFAULT_BASELINE_DIR.to_string()),
        }
    }

    /// Create baseline settings with defaults
    pub fn defaults() -> Self {
        Self {
            root_dir: DEFAULT_BASELINE_DIR.to_string(),
        }
    }
}

impl SessionSettings {
    /// Create session settings from environment variables
    pub fn from_env() -> Self {
        Self {
            base_dir: env::var(ENV_SESSION_DIR).unwrap_or_else(|_| DEFAULT_SESSION_DIR.to_string()),
        }
    }

    /// Create session settings with defaults
    pub fn defaults() -> Self {
        Self {
            base_dir: DEFAULT_SESSION_DIR.to_string(),
        }
    }
}

impl VlmSettings {
    /// Create VLM settings from environment variables
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_VLM_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_VLM_ENDPOINT.to_string()),
            model: env::var(ENV_VLM_MODEL).unwrap_or_else(|_| DEFAULT_VLM_MODEL.to_string()),
            max_tokens: env_parse(ENV_VLM_MAX_TOKENS, DEFAULT_VLM_MAX_TOKENS),
            connect_timeout: env_parse(ENV_VLM_CONNECT_TIMEOUT, DEFAULT_VLM_CONNECT_TIMEOUT),
            request_timeout: env_parse(ENV_VLM_TIMEOUT, DEFAULT_VLM_TIMEOUT),
        }
    }

    /// Create VLM settings with defaults
    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_VLM_ENDPOINT.to_string(),
            model: DEFAULT_VLM_MODEL.to_string(),
            max_tokens: DEFAULT_VLM_MAX_TOKENS,
            connect_timeout: DEFAULT_VLM_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_VLM_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.capture.max_sessions, DEFAULT_MAX_SESSIONS);
        assert_eq!(config.capture.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.baseline.root_dir, DEFAULT_BASELINE_DIR);
        assert_eq!(config.session.base_dir, DEFAULT_SESSION_DIR);
        assert_eq!(config.vlm.endpoint, DEFAULT_VLM_ENDPOINT);
    }

    #[test]
    fn test_backoff_bounds_sane() {
        let config = Config::defaults();
        assert!(config.capture.retry_base_ms <= config.capture.retry_max_ms);
    }
}
