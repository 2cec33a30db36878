//! Web Vision - visual regression testing for web pages.
//!
//! This crate provides:
//! - Resource-governed screenshot capture across rendering engines and
//!   device/viewport profiles, with retries and interaction scripts
//! - Pixel-level image diffing with diff raster generation
//! - Directory comparison with per-file failure isolation and reports
//! - Version-controlled baseline management (versions, branches,
//!   rollback, auto-selection)
//! - Optional vision model analysis of captures and differences
//! - Session management for organized temp files
//!
//! # Example
//!
//! ```rust,no_run
//! use web_vision::capture::{CaptureOptions, CaptureRequest, CaptureSource, Orchestrator};
//! use web_vision::capture::types::{EngineType, RenderProfile, ViewportSpec};
//! use std::path::Path;
//!
//! let orchestrator = Orchestrator::new();
//! let request = CaptureRequest {
//!     source: CaptureSource::Url("https://example.com".to_string()),
//!     engines: vec![EngineType::Chromium],
//!     profiles: vec![RenderProfile::Viewport(ViewportSpec::new("desktop", 1920, 1080))],
//! };
//! let artifacts = orchestrator
//!     .capture(&request, &CaptureOptions::default(), Path::new("./shots"), None)
//!     .unwrap();
//! println!("captured {} screenshots", artifacts.len());
//! ```

pub mod analyze;
pub mod baseline;
pub mod capture;
pub mod compare;
pub mod config;
pub mod diff;
pub mod governor;
pub mod report;
pub mod retry;
pub mod session;
pub mod util;

// Re-export capture types
pub use capture::{
    CaptureArtifact, CaptureError, CaptureOptions, CaptureRequest, CaptureResult, CaptureSource,
    InteractionStep, Orchestrator, RenderContext, RenderEngine,
};

// Re-export diff and comparison types
pub use compare::{compare_directories, CompareOptions, ComparisonReport, DiffEntry};
pub use diff::{diff_images, DiffError, DiffOutcome, DiffResult};

// Re-export baseline management
pub use baseline::{auto_select, BaselineCandidate, BaselineError, BaselineStore, UpdateOptions};

// Re-export analyzer
pub use analyze::{Analyzer, DifferenceAnalysis, DisabledAnalyzer, ScreenshotAnalysis, VlmAnalyzer};

// Re-export resource governor
pub use governor::{ResourceGovernor, SessionSlot};

// Re-export session management
pub use session::{cleanup_old_sessions, list_sessions, Session};
