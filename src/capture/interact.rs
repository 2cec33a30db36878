//! Scripted page interactions with a security gate on raw script payloads.
//!
//! [`InteractionStep`] is a closed sum type: every structured kind carries
//! inherently safe parameters and only `evaluate` carries untrusted code.
//! [`run_steps`] is the single path into execution, and it routes every
//! `evaluate` payload through the denylist scan before the engine sees it,
//! so new step kinds cannot bypass the gate by construction. Interaction
//! scripts may come from externally supplied automation and must be treated
//! as untrusted.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use crate::capture::engine::RenderContext;
use crate::capture::types::{CaptureError, CaptureResult};

/// Lowercase substrings that reject an `evaluate` payload.
///
/// Covers process, filesystem, child-process, eval, timer and
/// network-module access. Matching is case-insensitive: payloads are
/// lower-cased before the scan.
const EVALUATE_DENYLIST: &[&str] = &[
    "require(",
    "process.",
    "child_process",
    "fs.",
    "eval(",
    "new function",
    "settimeout",
    "setinterval",
    "import(",
    "xmlhttprequest",
    "fetch(",
    "websocket",
];

/// One scripted interaction against a live rendering context.
///
/// `after_delay` is a cooperative pause after the step, not a settle
/// guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", deny_unknown_fields)]
pub enum InteractionStep {
    /// Click the first element matching the selector
    Click {
        selector: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Type text into the element matching the selector
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Hover over the element matching the selector
    Hover {
        selector: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Drag from one element to another
    Drag {
        from: String,
        to: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Pick an option in a select element
    Select {
        selector: String,
        value: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Check a checkbox/radio element
    Check {
        selector: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Uncheck a checkbox element
    Uncheck {
        selector: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Press a named key (e.g., "Enter", "Tab")
    Press {
        key: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Scroll the page by the given offsets
    Scroll {
        #[serde(default)]
        x: i64,
        #[serde(default)]
        y: i64,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Pause for the given number of milliseconds
    Wait { ms: u64 },

    /// Run a raw script in the page. The only untrusted arm; payloads are
    /// denylist-scanned before compilation or execution.
    Evaluate {
        code: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },

    /// Capture an intermediate screenshot under the given name
    Screenshot {
        name: String,
        #[serde(default)]
        after_delay: Option<u64>,
    },
}

impl InteractionStep {
    /// Cooperative pause to honor after the step ran.
    pub fn after_delay(&self) -> Option<u64> {
        match self {
            InteractionStep::Click { after_delay, .. }
            | InteractionStep::Type { after_delay, .. }
            | InteractionStep::Hover { after_delay, .. }
            | InteractionStep::Drag { after_delay, .. }
            | InteractionStep::Select { after_delay, .. }
            | InteractionStep::Check { after_delay, .. }
            | InteractionStep::Uncheck { after_delay, .. }
            | InteractionStep::Press { after_delay, .. }
            | InteractionStep::Scroll { after_delay, .. }
            | InteractionStep::Evaluate { after_delay, .. }
            | InteractionStep::Screenshot { after_delay, .. } => *after_delay,
            InteractionStep::Wait { .. } => None,
        }
    }
}

/// Scan an `evaluate` payload against the denylist.
///
/// Rejects before any compilation or execution happens. The scan is
/// case-insensitive.
pub fn validate_script(code: &str) -> CaptureResult<()> {
    let lowered = code.to_lowercase();
    for token in EVALUATE_DENYLIST {
        if lowered.contains(token) {
            return Err(CaptureError::Security(format!(
                "evaluate script contains denylisted token '{}'",
                token
            )));
        }
    }
    Ok(())
}

/// Validate every `evaluate` payload in a step sequence.
///
/// The orchestrator calls this before entering its retried capture body, so
/// a security rejection is surfaced immediately instead of being retried.
pub fn validate_steps(steps: &[InteractionStep]) -> CaptureResult<()> {
    for step in steps {
        if let InteractionStep::Evaluate { code, .. } = step {
            validate_script(code)?;
        }
    }
    Ok(())
}

/// Execute an ordered step sequence against a live rendering context.
pub fn run_steps(ctx: &mut dyn RenderContext, steps: &[InteractionStep]) -> CaptureResult<()> {
    for step in steps {
        match step {
            InteractionStep::Click { selector, .. } => ctx.click(selector)?,
            InteractionStep::Type { selector, text, .. } => ctx.type_text(selector, text)?,
            InteractionStep::Hover { selector, .. } => ctx.hover(selector)?,
            InteractionStep::Drag { from, to, .. } => ctx.drag(from, to)?,
            InteractionStep::Select { selector, value, .. } => ctx.select(selector, value)?,
            InteractionStep::Check { selector, .. } => ctx.set_checked(selector, true)?,
            InteractionStep::Uncheck { selector, .. } => ctx.set_checked(selector, false)?,
            InteractionStep::Press { key, .. } => ctx.press(key)?,
            InteractionStep::Scroll { x, y, .. } => ctx.scroll(*x, *y)?,
            InteractionStep::Wait { ms } => thread::sleep(Duration::from_millis(*ms)),
            InteractionStep::Evaluate { code, .. } => {
                validate_script(code)?;
                ctx.evaluate(code)?;
            }
            InteractionStep::Screenshot { name, .. } => {
                // Intermediate screenshot; callers own where it goes.
                ctx.named_screenshot(name)?;
            }
        }
        if let Some(ms) = step.after_delay() {
            thread::sleep(Duration::from_millis(ms));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_allows_benign_script() {
        assert!(validate_script("document.querySelector('.menu').scrollIntoView()").is_ok());
        assert!(validate_script("window.scrollTo(0, 500)").is_ok());
    }

    #[test]
    fn test_validate_rejects_denylisted_tokens() {
        assert!(validate_script("require(\"fs\")").is_err());
        assert!(validate_script("process.exit(1)").is_err());
        assert!(validate_script("const cp = child_process").is_err());
        assert!(validate_script("eval('1+1')").is_err());
        assert!(validate_script("setTimeout(x, 0)").is_err());
        assert!(validate_script("fetch('http://evil')").is_err());
    }

    #[test]
    fn test_validate_is_case_insensitive() {
        assert!(validate_script("REQUIRE(\"fs\")").is_err());
        assert!(validate_script("Process.Env").is_err());
        assert!(validate_script("SetInterval(f, 10)").is_err());
    }

    #[test]
    fn test_validate_steps_flags_only_evaluate() {
        let steps = vec![
            InteractionStep::Click {
                selector: "#require(".to_string(),
                after_delay: None,
            },
            InteractionStep::Evaluate {
                code: "require('fs')".to_string(),
                after_delay: None,
            },
        ];
        // Structured arms cannot carry code; only the evaluate payload trips.
        assert!(validate_steps(&steps[..1]).is_ok());
        let err = validate_steps(&steps).unwrap_err();
        assert!(matches!(err, CaptureError::Security(_)));
    }

    #[test]
    fn test_step_deserialization() {
        let json = r##"[
            {"action": "click", "selector": "#submit"},
            {"action": "type", "selector": "#name", "text": "hi", "after_delay": 100},
            {"action": "wait", "ms": 250},
            {"action": "evaluate", "code": "window.scrollTo(0, 0)"}
        ]"##;
        let steps: Vec<InteractionStep> = serde_json::from_str(json).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[1].after_delay(), Some(100));
    }

    #[test]
    fn test_step_rejects_unknown_fields() {
        let json = r##"{"action": "click", "selector": "#a", "force": true}"##;
        let result: Result<InteractionStep, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
