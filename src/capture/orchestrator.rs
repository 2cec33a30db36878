//! Capture orchestration across engine x viewport/device combinations.
//!
//! Engines run strictly sequentially so the governor's concurrency cap
//! bounds the whole call rather than each engine. Viewport/device contexts
//! inside one engine run on their own worker threads, each holding a
//! governor slot, and write to non-colliding, pre-sanitized filenames.
//! The first unrecoverable error aborts the remaining combinations, no
//! silent partial results.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::analyze::Analyzer;
use crate::capture::engine::{ChromiumEngine, RenderEngine};
use crate::capture::interact;
use crate::capture::types::{
    CaptureArtifact, CaptureError, CaptureOptions, CaptureRequest, CaptureResult, EngineType,
    RenderProfile,
};
use crate::governor::ResourceGovernor;
use crate::retry::{self, RetryPolicy};
use crate::util::sanitize_name;

/// Drives captures across registered engines under governor and retry.
pub struct Orchestrator {
    governor: ResourceGovernor,
    engines: Vec<Box<dyn RenderEngine>>,
}

impl Orchestrator {
    /// Orchestrator with the default Chromium engine and a governor built
    /// from the ambient configuration.
    pub fn new() -> Self {
        Self::with_governor(ResourceGovernor::from_config(&crate::config::get().capture))
    }

    /// Orchestrator with the default Chromium engine registered.
    pub fn with_governor(governor: ResourceGovernor) -> Self {
        Self::with_engines(governor, vec![Box::new(ChromiumEngine::new())])
    }

    /// Orchestrator over an explicit engine set (tests register mocks here).
    pub fn with_engines(governor: ResourceGovernor, engines: Vec<Box<dyn RenderEngine>>) -> Self {
        Self { governor, engines }
    }

    fn engine_for(&self, engine_type: EngineType) -> CaptureResult<&dyn RenderEngine> {
        self.engines
            .iter()
            .find(|e| e.engine_type() == engine_type)
            .map(|e| e.as_ref())
            .ok_or_else(|| {
                CaptureError::Engine(format!("No engine registered for '{}'", engine_type))
            })
    }

    /// Capture the request's source under every engine x profile combination.
    ///
    /// Returns artifacts ordered engine-major, profile-minor. Interaction
    /// scripts are validated before any retried work begins, so a security
    /// rejection surfaces immediately and is never retried.
    pub fn capture(
        &self,
        request: &CaptureRequest,
        options: &CaptureOptions,
        output_dir: &Path,
        analyzer: Option<&dyn Analyzer>,
    ) -> CaptureResult<Vec<CaptureArtifact>> {
        interact::validate_steps(&options.interact)?;
        fs::create_dir_all(output_dir)?;

        let url = request.source.to_url();
        let settings = crate::config::get().capture.clone();
        let policy = RetryPolicy {
            max_retries: options.max_retries,
            base_delay: Duration::from_millis(settings.retry_base_ms),
            max_delay: Duration::from_millis(settings.retry_max_ms),
        };

        let mut artifacts = Vec::new();

        for engine_type in &request.engines {
            let engine = self.engine_for(*engine_type)?;

            let planned: Vec<(String, PathBuf)> = request
                .profiles
                .iter()
                .map(|profile| {
                    let profile_name = sanitize_name(profile.name());
                    let filename =
                        format!("{}_{}.png", sanitize_name(engine_type.as_str()), profile_name);
                    (profile_name, output_dir.join(filename))
                })
                .collect();

            // Profiles fan out onto worker threads; each holds a governor
            // slot, so the session cap bounds how many render at once.
            let results: Vec<CaptureResult<()>> = thread::scope(|scope| {
                let policy = &policy;
                let url = url.as_str();
                let handles: Vec<_> = request
                    .profiles
                    .iter()
                    .zip(&planned)
                    .map(|(profile, (_, file_path))| {
                        scope.spawn(move || {
                            self.governor.check_memory();
                            retry::with_retry(policy, || {
                                self.capture_one(
                                    engine, profile, url, options, file_path, output_dir,
                                )
                            })
                            .map(|_| ())
                            .map_err(CaptureError::from)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(CaptureError::Engine("capture worker panicked".to_string()))
                        })
                    })
                    .collect()
            });

            // Surface failures in profile order so errors stay deterministic.
            for (result, (profile_name, file_path)) in results.into_iter().zip(planned) {
                result?;

                let analysis = match analyzer {
                    Some(a) if options.analyze => Some(a.analyze_screenshot(&file_path)),
                    _ => None,
                };

                artifacts.push(CaptureArtifact {
                    engine: *engine_type,
                    profile_name,
                    file_path,
                    source_url: url.clone(),
                    analysis,
                });
            }
        }

        Ok(artifacts)
    }

    /// One engine x profile combination: isolated context, governed slot,
    /// navigate, interact, settle, extract. The slot guard releases on every
    /// exit path.
    fn capture_one(
        &self,
        engine: &dyn RenderEngine,
        profile: &RenderProfile,
        url: &str,
        options: &CaptureOptions,
        file_path: &Path,
        output_dir: &Path,
    ) -> CaptureResult<PathBuf> {
        let _slot = self.governor.acquire();
        let mut ctx = engine.new_context(profile)?;

        let timeout = Duration::from_millis(options.timeout_ms);
        ctx.navigate(url, timeout)?;

        if let Some(selector) = &options.wait_for_selector {
            ctx.wait_for_selector(selector, timeout)?;
        }

        if !options.interact.is_empty() {
            interact::run_steps(ctx.as_mut(), &options.interact)?;
        }

        if options.settle_delay_ms > 0 {
            thread::sleep(Duration::from_millis(options.settle_delay_ms));
        }

        let png = ctx.screenshot(options.full_page)?;
        fs::write(file_path, &png)?;

        for (name, bytes) in ctx.take_named_screenshots() {
            let shot_path = output_dir.join(format!("{}.png", sanitize_name(&name)));
            fs::write(shot_path, bytes)?;
        }

        Ok(file_path.to_path_buf())
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::engine::MockEngine;
    use crate::capture::interact::InteractionStep;
    use crate::capture::types::{CaptureSource, ViewportSpec};

    fn mock_orchestrator(engines: Vec<Box<dyn RenderEngine>>) -> Orchestrator {
        Orchestrator::with_engines(ResourceGovernor::new(2, 4096), engines)
    }

    fn request(engines: Vec<EngineType>) -> CaptureRequest {
        CaptureRequest {
            source: CaptureSource::Url("http://example.com".to_string()),
            engines,
            profiles: vec![
                RenderProfile::Viewport(ViewportSpec::new("desktop", 64, 48)),
                RenderProfile::Viewport(ViewportSpec::new("mobile", 32, 48)),
            ],
        }
    }

    fn fast_options() -> CaptureOptions {
        CaptureOptions {
            settle_delay_ms: 0,
            max_retries: 0,
            ..CaptureOptions::default()
        }
    }

    #[test]
    fn test_capture_engine_major_order_and_paths() {
        let orchestrator = mock_orchestrator(vec![
            Box::new(MockEngine::new(EngineType::Chromium)),
            Box::new(MockEngine::new(EngineType::Firefox)),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let artifacts = orchestrator
            .capture(
                &request(vec![EngineType::Firefox, EngineType::Chromium]),
                &fast_options(),
                dir.path(),
                None,
            )
            .unwrap();

        let names: Vec<String> = artifacts
            .iter()
            .map(|a| a.file_path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "firefox_desktop.png",
                "firefox_mobile.png",
                "chromium_desktop.png",
                "chromium_mobile.png",
            ]
        );
        for artifact in &artifacts {
            assert!(artifact.file_path.exists());
            assert!(artifact.analysis.is_none());
        }
    }

    #[test]
    fn test_capture_sanitizes_profile_names() {
        let orchestrator = mock_orchestrator(vec![Box::new(MockEngine::new(EngineType::Chromium))]);
        let dir = tempfile::tempdir().unwrap();
        let req = CaptureRequest {
            source: CaptureSource::Url("http://example.com".to_string()),
            engines: vec![EngineType::Chromium],
            profiles: vec![RenderProfile::Viewport(ViewportSpec::new("../evil name", 32, 32))],
        };
        let artifacts = orchestrator.capture(&req, &fast_options(), dir.path(), None).unwrap();
        assert_eq!(artifacts[0].profile_name, "evilname");
        assert!(dir.path().join("chromium_evilname.png").exists());
    }

    #[test]
    fn test_capture_unregistered_engine_fails() {
        let orchestrator = mock_orchestrator(vec![Box::new(MockEngine::new(EngineType::Chromium))]);
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator
            .capture(&request(vec![EngineType::Webkit]), &fast_options(), dir.path(), None)
            .unwrap_err();
        assert!(matches!(err, CaptureError::Engine(_)));
    }

    #[test]
    fn test_capture_retries_transient_failures() {
        let orchestrator = mock_orchestrator(vec![Box::new(
            MockEngine::new(EngineType::Chromium).failing_navigations(2),
        )]);
        let dir = tempfile::tempdir().unwrap();
        let mut options = fast_options();
        options.max_retries = 2;
        let req = CaptureRequest {
            source: CaptureSource::Url("http://example.com".to_string()),
            engines: vec![EngineType::Chromium],
            profiles: vec![RenderProfile::Viewport(ViewportSpec::new("desktop", 32, 32))],
        };
        let artifacts = orchestrator.capture(&req, &options, dir.path(), None).unwrap();
        assert_eq!(artifacts.len(), 1);
    }

    #[test]
    fn test_capture_exhausted_retries_aggregate() {
        let orchestrator = mock_orchestrator(vec![Box::new(
            MockEngine::new(EngineType::Chromium).failing_navigations(10),
        )]);
        let dir = tempfile::tempdir().unwrap();
        let mut options = fast_options();
        options.max_retries = 1;
        let req = CaptureRequest {
            source: CaptureSource::Url("http://example.com".to_string()),
            engines: vec![EngineType::Chromium],
            profiles: vec![RenderProfile::Viewport(ViewportSpec::new("desktop", 32, 32))],
        };
        let err = orchestrator.capture(&req, &options, dir.path(), None).unwrap_err();
        match err {
            CaptureError::RetryExhausted { attempts, message } => {
                assert_eq!(attempts, 2);
                assert!(message.contains("mock navigation failure"));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_capture_rejects_denylisted_script_before_any_work() {
        let engine = MockEngine::new(EngineType::Chromium);
        let log = engine.step_log();
        let orchestrator = mock_orchestrator(vec![Box::new(engine)]);
        let dir = tempfile::tempdir().unwrap();
        let mut options = fast_options();
        options.interact = vec![InteractionStep::Evaluate {
            code: "REQUIRE(\"fs\")".to_string(),
            after_delay: None,
        }];
        let err = orchestrator
            .capture(&request(vec![EngineType::Chromium]), &options, dir.path(), None)
            .unwrap_err();
        assert!(matches!(err, CaptureError::Security(_)));
        // Nothing ran: the rejection happened before any context was opened.
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_slots_released_after_capture() {
        let governor = ResourceGovernor::new(1, 4096);
        let orchestrator = Orchestrator::with_engines(
            governor.clone(),
            vec![Box::new(MockEngine::new(EngineType::Chromium))],
        );
        let dir = tempfile::tempdir().unwrap();
        orchestrator
            .capture(&request(vec![EngineType::Chromium]), &fast_options(), dir.path(), None)
            .unwrap();
        assert_eq!(governor.active_sessions(), 0);
    }

    #[test]
    fn test_profiles_fan_out_under_session_cap() {
        use std::sync::atomic::Ordering;

        let engine = MockEngine::new(EngineType::Chromium)
            .navigation_delay(Duration::from_millis(100));
        let peak = engine.peak_concurrency();
        let governor = ResourceGovernor::new(2, 1_000_000);
        let orchestrator = Orchestrator::with_engines(governor.clone(), vec![Box::new(engine)]);
        let dir = tempfile::tempdir().unwrap();
        let req = CaptureRequest {
            source: CaptureSource::Url("http://example.com".to_string()),
            engines: vec![EngineType::Chromium],
            profiles: (0..4)
                .map(|i| RenderProfile::Viewport(ViewportSpec::new(format!("p{}", i), 32, 32)))
                .collect(),
        };
        let artifacts = orchestrator.capture(&req, &fast_options(), dir.path(), None).unwrap();
        assert_eq!(artifacts.len(), 4);

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak >= 2, "captures never overlapped, peak {}", peak);
        assert!(peak <= 2, "session cap exceeded, peak {}", peak);
        assert_eq!(governor.active_sessions(), 0);
    }

    #[test]
    fn test_interactions_reach_context() {
        let engine = MockEngine::new(EngineType::Chromium);
        let log = engine.step_log();
        let orchestrator = mock_orchestrator(vec![Box::new(engine)]);
        let dir = tempfile::tempdir().unwrap();
        let mut options = fast_options();
        options.interact = vec![
            InteractionStep::Click {
                selector: "#open".to_string(),
                after_delay: None,
            },
            InteractionStep::Scroll {
                x: 0,
                y: 300,
                after_delay: None,
            },
        ];
        let req = CaptureRequest {
            source: CaptureSource::Url("http://example.com".to_string()),
            engines: vec![EngineType::Chromium],
            profiles: vec![RenderProfile::Viewport(ViewportSpec::new("desktop", 32, 32))],
        };
        orchestrator.capture(&req, &options, dir.path(), None).unwrap();
        let entries = log.lock().unwrap();
        assert!(entries.iter().any(|e| e.contains("click #open")));
        assert!(entries.iter().any(|e| e.contains("scroll 0 300")));
    }
}
