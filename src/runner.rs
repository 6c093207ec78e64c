use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use headless_chrome::Tab;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AgentError;
use crate::hands::{BrowserSession, resolve_element};
use crate::types::{Action, Output, Plan, RunOutcome, Step, TraceEntry};

const NAVIGATE_TIMEOUT: Duration = Duration::from_secs(30);
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(15);
const VISIBLE_TIMEOUT: Duration = Duration::from_secs(20);
const SCREENSHOT_WAIT: Duration = Duration::from_secs(3);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PAUSE_MS: u64 = 1000;
const TRACE_VALUE_LIMIT: usize = 120;

/// Execute a validated plan against one fresh browser session.
///
/// The session is opened before the first step and released on every exit
/// path. In-run failures never escape as errors: they are folded into the
/// outcome together with whatever outputs and timeline exist so far.
pub fn run_plan(config: &Config, plan: &Plan, trace: bool) -> RunOutcome {
    let mut timeline = trace.then(Vec::new);

    if config.browser_ws.is_empty() {
        let error = AgentError::Configuration("browser endpoint is not configured".into());
        return failed_outcome(error.to_string(), Vec::new(), timeline);
    }

    let session = match BrowserSession::connect(&config.browser_ws) {
        Ok(session) => session,
        Err(err) => return failed_outcome(format!("{err:#}"), Vec::new(), timeline),
    };
    let tab = session.tab.clone();

    let mut outputs = Vec::new();
    for (index, step) in plan.steps.iter().enumerate() {
        info!(index, action = %step.action, target = %step.target, "executing step");
        let started = Instant::now();

        let result = execute_step(&tab, step, &mut outputs);
        if result.is_ok() && step.action.mutates_page() {
            settle(&tab);
        }
        if let Some(timeline) = timeline.as_mut() {
            timeline.push(capture_trace(&tab, index, step, started));
        }

        if let Err(err) = result {
            warn!(index, action = %step.action, "step failed: {err:#}");
            return RunOutcome {
                ok: false,
                url: tab.get_url(),
                title: tab.get_title().unwrap_or_default(),
                outputs,
                timeline,
                error: Some(format!("step {} ({}): {err:#}", index + 1, step.action)),
            };
        }
    }

    RunOutcome {
        ok: true,
        url: tab.get_url(),
        title: tab.get_title().unwrap_or_default(),
        outputs,
        timeline,
        error: None,
    }
}

fn failed_outcome(
    error: String,
    outputs: Vec<Output>,
    timeline: Option<Vec<TraceEntry>>,
) -> RunOutcome {
    RunOutcome {
        ok: false,
        url: String::new(),
        title: String::new(),
        outputs,
        timeline,
        error: Some(error),
    }
}

fn execute_step(tab: &Tab, step: &Step, outputs: &mut Vec<Output>) -> Result<()> {
    match &step.action {
        Action::Goto => {
            tab.set_default_timeout(NAVIGATE_TIMEOUT);
            tab.navigate_to(&step.target)
                .with_context(|| format!("could not navigate to {:?}", step.target))?;
            tab.wait_until_navigated()
                .context("navigation did not complete")?;
        }
        Action::Click => {
            resolve_element(tab, &step.target, ELEMENT_TIMEOUT)?
                .click()
                .with_context(|| format!("could not click {:?}", step.target))?;
        }
        Action::Type => {
            let element = resolve_element(tab, &step.target, ELEMENT_TIMEOUT)?;
            // Replace existing content instead of appending to it.
            let _ = element.call_js_fn(
                "function () { if ('value' in this) { this.value = ''; } }",
                vec![],
                false,
            );
            element
                .type_into(&value_as_string(&step.value))
                .with_context(|| format!("could not type into {:?}", step.target))?;
        }
        Action::Press => {
            let key = value_as_string(&step.value);
            let key = if key.is_empty() {
                "Enter".to_string()
            } else {
                key
            };
            tab.press_key(&key)
                .with_context(|| format!("could not press {key:?}"))?;
        }
        Action::Wait => match wait_kind(&step.value) {
            WaitKind::Pause(ms) => thread::sleep(Duration::from_millis(ms)),
            WaitKind::Target(target) => {
                resolve_element(tab, &target, VISIBLE_TIMEOUT)?;
            }
        },
        Action::Extract => {
            let as_html = value_as_string(&step.value).eq_ignore_ascii_case("html");
            let mode = if as_html { "html" } else { "text" };
            // A target that never resolves yields a null result.
            let result = match resolve_element(tab, &step.target, ELEMENT_TIMEOUT) {
                Ok(element) => {
                    let content = if as_html {
                        element.get_content()
                    } else {
                        element.get_inner_text()
                    };
                    Value::String(
                        content.with_context(|| format!("could not read {:?}", step.target))?,
                    )
                }
                Err(_) => Value::Null,
            };
            outputs.push(Output::extract(&step.target, mode, result));
        }
        Action::Screenshot => {
            let png = if step.target.is_empty() {
                tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                    .context("could not capture page screenshot")?
            } else {
                resolve_element(tab, &step.target, SCREENSHOT_WAIT)?
                    .capture_screenshot(CaptureScreenshotFormatOption::Png)
                    .with_context(|| format!("could not capture {:?}", step.target))?
            };
            outputs.push(Output::screenshot(&step.target, STANDARD.encode(png)));
        }
        Action::Done => {}
        Action::Unrecognized(name) => {
            warn!(action = %name, "unknown action, recorded and skipped");
            outputs.push(Output::unrecognized(name));
        }
    }
    Ok(())
}

/// Best-effort wait for the page to finish loading after a mutating action.
/// A timeout here is a settle hint, not a correctness requirement.
fn settle(tab: &Tab) {
    tab.set_default_timeout(SETTLE_TIMEOUT);
    if let Err(err) = tab.wait_until_navigated() {
        debug!("settle wait gave up: {err:#}");
    }
}

/// Capture one trace entry. A failed screenshot yields an empty string.
fn capture_trace(tab: &Tab, index: usize, step: &Step, started: Instant) -> TraceEntry {
    let screenshot = tab
        .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        .map(|png| STANDARD.encode(png))
        .unwrap_or_default();
    TraceEntry {
        index,
        action: step.action.name().to_string(),
        target: step.target.clone(),
        value: truncate_value(&step.value),
        url: tab.get_url(),
        title: tab.get_title().unwrap_or_default(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        screenshot_base64: screenshot,
    }
}

/// Coerce a step value to text; the wire allows strings and numbers.
fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

enum WaitKind {
    Pause(u64),
    Target(String),
}

/// A numeric value is a pause in milliseconds, a non-empty string is a
/// target to await, anything else is the default pause.
fn wait_kind(value: &Value) -> WaitKind {
    if let Some(ms) = value.as_u64() {
        WaitKind::Pause(ms)
    } else if let Some(ms) = value.as_f64() {
        WaitKind::Pause(ms.max(0.0) as u64)
    } else if let Some(target) = value.as_str().filter(|t| !t.is_empty()) {
        WaitKind::Target(target.to_string())
    } else {
        WaitKind::Pause(DEFAULT_PAUSE_MS)
    }
}

/// Long string values are clipped so traces stay readable.
fn truncate_value(value: &Value) -> Value {
    if let Some(text) = value.as_str() {
        if text.chars().count() > TRACE_VALUE_LIMIT {
            return Value::String(text.chars().take(TRACE_VALUE_LIMIT).collect());
        }
    }
    value.clone()
}
