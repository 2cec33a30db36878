//! Rendering engine abstraction.
//!
//! This module provides a unified interface over interchangeable rendering
//! backends:
//! - `ChromiumEngine` drives a headless Chromium session per context
//! - `MockEngine` renders deterministic synthetic pages for testing
//!
//! A [`RenderContext`] is one isolated rendering session — the unit the
//! resource governor counts and caps. Contexts within one engine are
//! independent of each other.

use image::{ImageBuffer, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::capture::types::{CaptureError, CaptureResult, EngineType, RenderProfile};

/// Factory for isolated rendering contexts of one engine type.
pub trait RenderEngine: Send + Sync {
    /// Which engine this is
    fn engine_type(&self) -> EngineType;

    /// Open a fresh, isolated rendering context for the given profile
    fn new_context(&self, profile: &RenderProfile) -> CaptureResult<Box<dyn RenderContext>>;
}

/// One live rendering session.
pub trait RenderContext {
    /// Navigate to a URL with a bounded timeout
    fn navigate(&mut self, url: &str, timeout: Duration) -> CaptureResult<()>;

    /// Wait until the selector matches an element
    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> CaptureResult<()>;

    fn click(&mut self, selector: &str) -> CaptureResult<()>;

    fn type_text(&mut self, selector: &str, text: &str) -> CaptureResult<()>;

    fn hover(&mut self, selector: &str) -> CaptureResult<()>;

    fn drag(&mut self, from: &str, to: &str) -> CaptureResult<()>;

    fn select(&mut self, selector: &str, value: &str) -> CaptureResult<()>;

    fn set_checked(&mut self, selector: &str, checked: bool) -> CaptureResult<()>;

    fn press(&mut self, key: &str) -> CaptureResult<()>;

    fn scroll(&mut self, x: i64, y: i64) -> CaptureResult<()>;

    /// Run an already-validated script in the page.
    ///
    /// Callers must route payloads through the interaction validator first;
    /// this method is only reached from the gated execution path.
    fn evaluate(&mut self, code: &str) -> CaptureResult<()>;

    /// Record an intermediate screenshot under the given name
    fn named_screenshot(&mut self, name: &str) -> CaptureResult<()>;

    /// Extract the final raster as PNG bytes (full page or viewport only)
    fn screenshot(&mut self, full_page: bool) -> CaptureResult<Vec<u8>>;

    /// Drain intermediate screenshots recorded by `named_screenshot`
    fn take_named_screenshots(&mut self) -> Vec<(String, Vec<u8>)> {
        Vec::new()
    }
}

// =============================================================================
// Chromium engine (headless_chrome)
// =============================================================================

/// Chromium-backed engine. Each context launches its own headless browser
/// sized to the profile, so contexts share nothing.
pub struct ChromiumEngine;

impl ChromiumEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChromiumEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for ChromiumEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Chromium
    }

    fn new_context(&self, profile: &RenderProfile) -> CaptureResult<Box<dyn RenderContext>> {
        let (width, height) = profile.dimensions();
        let options = headless_chrome::LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((width, height)))
            .build()
            .map_err(|e| CaptureError::Engine(format!("Failed to build launch options: {}", e)))?;
        let browser = headless_chrome::Browser::new(options)
            .map_err(|e| CaptureError::Engine(format!("Failed to launch Chromium: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| CaptureError::Engine(format!("Failed to open tab: {}", e)))?;
        if let RenderProfile::Device(device) = profile {
            apply_device_emulation(&tab, device)?;
        }
        Ok(Box::new(ChromiumContext {
            _browser: browser,
            tab,
            viewport: (width, height),
            named_shots: Vec::new(),
        }))
    }
}

/// Make the tab present itself as the emulated device: user agent plus
/// viewport metrics (device pixel ratio, mobile flag).
fn apply_device_emulation(
    tab: &headless_chrome::Tab,
    device: &crate::capture::types::DeviceProfile,
) -> CaptureResult<()> {
    tab.set_user_agent(&device.user_agent, None, None)
        .map_err(|e| CaptureError::Engine(format!("Failed to set user agent: {}", e)))?;
    tab.call_method(device_metrics(device))
        .map_err(|e| CaptureError::Engine(format!("Failed to set device metrics: {}", e)))?;
    Ok(())
}

fn device_metrics(
    device: &crate::capture::types::DeviceProfile,
) -> headless_chrome::protocol::cdp::Emulation::SetDeviceMetricsOverride {
    headless_chrome::protocol::cdp::Emulation::SetDeviceMetricsOverride {
        width: device.width,
        height: device.height,
        device_scale_factor: f64::from(device.pixel_density),
        mobile: device.is_mobile,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

struct ChromiumContext {
    // Dropping the browser tears the whole session down.
    _browser: headless_chrome::Browser,
    tab: Arc<headless_chrome::Tab>,
    viewport: (u32, u32),
    named_shots: Vec<(String, Vec<u8>)>,
}

fn engine_err(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Engine(err.to_string())
}

impl ChromiumContext {
    /// Run a script the crate itself generated for a structured step.
    /// Selector/value parameters are JSON-escaped before interpolation.
    fn run_structured_script(&self, code: &str) -> CaptureResult<()> {
        self.tab.evaluate(code, false).map_err(engine_err)?;
        Ok(())
    }
}

impl RenderContext for ChromiumContext {
    fn navigate(&mut self, url: &str, timeout: Duration) -> CaptureResult<()> {
        self.tab.set_default_timeout(timeout);
        self.tab.navigate_to(url).map_err(engine_err)?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| CaptureError::Timeout(format!("Navigation to {} failed: {}", url, e)))?;
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> CaptureResult<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|e| CaptureError::Timeout(format!("Selector '{}' not found: {}", selector, e)))?;
        Ok(())
    }

    fn click(&mut self, selector: &str) -> CaptureResult<()> {
        self.tab
            .find_element(selector)
            .map_err(engine_err)?
            .click()
            .map_err(engine_err)?;
        Ok(())
    }

    fn type_text(&mut self, selector: &str, text: &str) -> CaptureResult<()> {
        self.tab
            .find_element(selector)
            .map_err(engine_err)?
            .click()
            .map_err(engine_err)?;
        self.tab.type_str(text).map_err(engine_err)?;
        Ok(())
    }

    fn hover(&mut self, selector: &str) -> CaptureResult<()> {
        self.tab
            .find_element(selector)
            .map_err(engine_err)?
            .move_mouse_over()
            .map_err(engine_err)?;
        Ok(())
    }

    fn drag(&mut self, from: &str, to: &str) -> CaptureResult<()> {
        let from_json = serde_json::to_string(from).map_err(engine_err)?;
        let to_json = serde_json::to_string(to).map_err(engine_err)?;
        let script = format!(
            "(() => {{\
               const src = document.querySelector({from_json});\
               const dst = document.querySelector({to_json});\
               if (!src || !dst) throw new Error('drag endpoints not found');\
               const dt = new DataTransfer();\
               src.dispatchEvent(new DragEvent('dragstart', {{ dataTransfer: dt, bubbles: true }}));\
               dst.dispatchEvent(new DragEvent('dragover', {{ dataTransfer: dt, bubbles: true }}));\
               dst.dispatchEvent(new DragEvent('drop', {{ dataTransfer: dt, bubbles: true }}));\
               src.dispatchEvent(new DragEvent('dragend', {{ dataTransfer: dt, bubbles: true }}));\
             }})()"
        );
        self.run_structured_script(&script)
    }

    fn select(&mut self, selector: &str, value: &str) -> CaptureResult<()> {
        let sel_json = serde_json::to_string(selector).map_err(engine_err)?;
        let value_json = serde_json::to_string(value).map_err(engine_err)?;
        let script = format!(
            "(() => {{\
               const el = document.querySelector({sel_json});\
               if (!el) throw new Error('select target not found');\
               el.value = {value_json};\
               el.dispatchEvent(new Event('change', {{ bubbles: true }}));\
             }})()"
        );
        self.run_structured_script(&script)
    }

    fn set_checked(&mut self, selector: &str, checked: bool) -> CaptureResult<()> {
        let sel_json = serde_json::to_string(selector).map_err(engine_err)?;
        let script = format!(
            "(() => {{\
               const el = document.querySelector({sel_json});\
               if (!el) throw new Error('checkbox not found');\
               el.checked = {checked};\
               el.dispatchEvent(new Event('change', {{ bubbles: true }}));\
             }})()"
        );
        self.run_structured_script(&script)
    }

    fn press(&mut self, key: &str) -> CaptureResult<()> {
        self.tab.press_key(key).map_err(engine_err)?;
        Ok(())
    }

    fn scroll(&mut self, x: i64, y: i64) -> CaptureResult<()> {
        let script = format!("window.scrollBy({x}, {y})");
        self.run_structured_script(&script)
    }

    fn evaluate(&mut self, code: &str) -> CaptureResult<()> {
        self.tab.evaluate(code, false).map_err(engine_err)?;
        Ok(())
    }

    fn named_screenshot(&mut self, name: &str) -> CaptureResult<()> {
        let bytes = self.screenshot(false)?;
        self.named_shots.push((name.to_string(), bytes));
        Ok(())
    }

    fn screenshot(&mut self, full_page: bool) -> CaptureResult<Vec<u8>> {
        use headless_chrome::protocol::cdp::Page;

        let clip = if full_page {
            let result = self
                .tab
                .evaluate("document.documentElement.scrollHeight", false)
                .map_err(engine_err)?;
            let content_height = result
                .value
                .as_ref()
                .and_then(|v| v.as_f64())
                .unwrap_or(f64::from(self.viewport.1));
            Some(Page::Viewport {
                x: 0.0,
                y: 0.0,
                width: f64::from(self.viewport.0),
                height: content_height.max(f64::from(self.viewport.1)),
                scale: 1.0,
            })
        } else {
            None
        };

        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, clip, true)
            .map_err(engine_err)
    }

    fn take_named_screenshots(&mut self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut self.named_shots)
    }
}

// =============================================================================
// Mock engine
// =============================================================================

/// Deterministic in-memory engine for tests.
///
/// Renders a synthetic page whose pixels depend on the profile dimensions
/// and the interactions that ran, records every executed step in a shared
/// log, and can be scripted to fail its first N navigations to exercise
/// retry paths.
pub struct MockEngine {
    engine_type: EngineType,
    step_log: Arc<Mutex<Vec<String>>>,
    failures_remaining: Arc<AtomicU32>,
    nav_delay: Duration,
    in_flight: Arc<AtomicU32>,
    peak_in_flight: Arc<AtomicU32>,
}

impl MockEngine {
    pub fn new(engine_type: EngineType) -> Self {
        Self {
            engine_type,
            step_log: Arc::new(Mutex::new(Vec::new())),
            failures_remaining: Arc::new(AtomicU32::new(0)),
            nav_delay: Duration::ZERO,
            in_flight: Arc::new(AtomicU32::new(0)),
            peak_in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the first `n` navigations with a transient engine error.
    pub fn failing_navigations(self, n: u32) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Stall every navigation, making concurrent contexts overlap.
    pub fn navigation_delay(mut self, delay: Duration) -> Self {
        self.nav_delay = delay;
        self
    }

    /// Shared log of executed steps, for assertions.
    pub fn step_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.step_log)
    }

    /// Highest number of navigations observed in flight at once.
    pub fn peak_concurrency(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.peak_in_flight)
    }
}

impl RenderEngine for MockEngine {
    fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    fn new_context(&self, profile: &RenderProfile) -> CaptureResult<Box<dyn RenderContext>> {
        let (width, height) = profile.dimensions();
        Ok(Box::new(MockContext {
            width,
            height,
            navigated: false,
            steps_run: 0,
            step_log: Arc::clone(&self.step_log),
            failures_remaining: Arc::clone(&self.failures_remaining),
            nav_delay: self.nav_delay,
            in_flight: Arc::clone(&self.in_flight),
            peak_in_flight: Arc::clone(&self.peak_in_flight),
            named_shots: Vec::new(),
        }))
    }
}

struct MockContext {
    width: u32,
    height: u32,
    navigated: bool,
    steps_run: u32,
    step_log: Arc<Mutex<Vec<String>>>,
    failures_remaining: Arc<AtomicU32>,
    nav_delay: Duration,
    in_flight: Arc<AtomicU32>,
    peak_in_flight: Arc<AtomicU32>,
    named_shots: Vec<(String, Vec<u8>)>,
}

impl MockContext {
    fn log(&mut self, entry: String) {
        self.steps_run += 1;
        if let Ok(mut log) = self.step_log.lock() {
            log.push(entry);
        }
    }

    fn render(&self) -> RgbImage {
        // Background derives from dimensions, a marker strip from the number
        // of executed steps, so interactions visibly change the raster.
        let bg = [
            (self.width % 251) as u8,
            (self.height % 251) as u8,
            ((self.width + self.height) % 251) as u8,
        ];
        let mut img: RgbImage = ImageBuffer::from_pixel(self.width, self.height, image::Rgb(bg));
        let strip_height = (self.steps_run * 4).min(self.height);
        for y in 0..strip_height {
            for x in 0..self.width.min(32) {
                img.put_pixel(x, y, image::Rgb([255, 255, 255]));
            }
        }
        img
    }

    fn encode(&self) -> CaptureResult<Vec<u8>> {
        let img = self.render();
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| CaptureError::Image(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }
}

impl RenderContext for MockContext {
    fn navigate(&mut self, url: &str, _timeout: Duration) -> CaptureResult<()> {
        if self.failures_remaining.load(Ordering::SeqCst) > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(CaptureError::Engine(format!(
                "mock navigation failure for {}",
                url
            )));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.nav_delay.is_zero() {
            std::thread::sleep(self.nav_delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.navigated = true;
        self.log(format!("navigate {}", url));
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> CaptureResult<()> {
        self.log(format!("wait_for {}", selector));
        Ok(())
    }

    fn click(&mut self, selector: &str) -> CaptureResult<()> {
        self.log(format!("click {}", selector));
        Ok(())
    }

    fn type_text(&mut self, selector: &str, text: &str) -> CaptureResult<()> {
        self.log(format!("type {} {}", selector, text));
        Ok(())
    }

    fn hover(&mut self, selector: &str) -> CaptureResult<()> {
        self.log(format!("hover {}", selector));
        Ok(())
    }

    fn drag(&mut self, from: &str, to: &str) -> CaptureResult<()> {
        self.log(format!("drag {} -> {}", from, to));
        Ok(())
    }

    fn select(&mut self, selector: &str, value: &str) -> CaptureResult<()> {
        self.log(format!("select {} = {}", selector, value));
        Ok(())
    }

    fn set_checked(&mut self, selector: &str, checked: bool) -> CaptureResult<()> {
        self.log(format!("set_checked {} {}", selector, checked));
        Ok(())
    }

    fn press(&mut self, key: &str) -> CaptureResult<()> {
        self.log(format!("press {}", key));
        Ok(())
    }

    fn scroll(&mut self, x: i64, y: i64) -> CaptureResult<()> {
        self.log(format!("scroll {} {}", x, y));
        Ok(())
    }

    fn evaluate(&mut self, code: &str) -> CaptureResult<()> {
        self.log(format!("evaluate {}", code));
        Ok(())
    }

    fn named_screenshot(&mut self, name: &str) -> CaptureResult<()> {
        let bytes = self.encode()?;
        self.named_shots.push((name.to_string(), bytes));
        self.log(format!("screenshot {}", name));
        Ok(())
    }

    fn screenshot(&mut self, _full_page: bool) -> CaptureResult<Vec<u8>> {
        if !self.navigated {
            return Err(CaptureError::Engine("screenshot before navigation".to_string()));
        }
        self.encode()
    }

    fn take_named_screenshots(&mut self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut self.named_shots)
    }
}
