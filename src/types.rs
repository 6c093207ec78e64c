use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// Hard cap on plan length; anything longer is silently cut.
pub const MAX_PLAN_STEPS: usize = 12;

/// A single browser instruction the planner can emit.
///
/// The wire form is a plain lower-case string; anything outside the known
/// set is kept as `Unrecognized` so the runner can record it inline instead
/// of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Goto,
    Click,
    Type,
    Press,
    Wait,
    Extract,
    Screenshot,
    Done,
    Unrecognized(String),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Goto => "goto",
            Action::Click => "click",
            Action::Type => "type",
            Action::Press => "press",
            Action::Wait => "wait",
            Action::Extract => "extract",
            Action::Screenshot => "screenshot",
            Action::Done => "done",
            Action::Unrecognized(name) => name,
        }
    }

    /// Actions that change page state and get a settle wait afterwards.
    pub fn mutates_page(&self) -> bool {
        matches!(
            self,
            Action::Goto | Action::Click | Action::Type | Action::Press
        )
    }
}

impl From<String> for Action {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "goto" => Action::Goto,
            "click" => Action::Click,
            "type" => Action::Type,
            "press" => Action::Press,
            "wait" => Action::Wait,
            "extract" => Action::Extract,
            "screenshot" => Action::Screenshot,
            "done" => Action::Done,
            other => Action::Unrecognized(other.to_string()),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.name().to_string()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One declarative step: action plus target plus value.
///
/// `value` stays a raw JSON value because the wire format allows both
/// strings and numbers (`wait` uses numbers for millisecond pauses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub action: Action,
    #[serde(default)]
    pub target: String,
    #[serde(default = "empty_value")]
    pub value: Value,
}

fn empty_value() -> Value {
    Value::String(String::new())
}

/// Validated ordered sequence of steps. Order is execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

/// Normalize and shape-check an untrusted plan candidate.
///
/// Fails when the candidate is not an object, `steps` is not an array, or
/// any retained step lacks an `action`. Normalization lower-cases `action`,
/// defaults `target`/`value` to empty strings, and drops steps beyond
/// `MAX_PLAN_STEPS` regardless of their content.
pub fn validate(candidate: &Value) -> Result<Plan, AgentError> {
    let Some(plan) = candidate.as_object() else {
        return Err(AgentError::MalformedPlan("plan is not a JSON object".into()));
    };
    let Some(raw_steps) = plan.get("steps").and_then(Value::as_array) else {
        return Err(AgentError::MalformedPlan(
            "'steps' is missing or not an array".into(),
        ));
    };

    let mut steps = Vec::with_capacity(raw_steps.len().min(MAX_PLAN_STEPS));
    for (index, raw) in raw_steps.iter().take(MAX_PLAN_STEPS).enumerate() {
        let action = match raw.get("action") {
            Some(Value::String(name)) if !name.is_empty() => Action::from(name.clone()),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(AgentError::MalformedPlan(format!(
                    "step {index} has no 'action'"
                )));
            }
            Some(other) => Action::from(other.to_string()),
        };
        let target = match raw.get("target") {
            Some(Value::String(text)) => text.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };
        let value = match raw.get("value") {
            None => empty_value(),
            Some(value) => value.clone(),
        };
        steps.push(Step {
            action,
            target,
            value,
        });
    }

    Ok(Plan { steps })
}

/// One result record appended by the runner, tagged by action.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Output {
    Extract {
        action: String,
        target: String,
        mode: String,
        result: Value,
    },
    Screenshot {
        action: String,
        target: String,
        #[serde(rename = "type")]
        format: String,
        base64: String,
    },
    Unrecognized {
        action: String,
        error: String,
    },
}

impl Output {
    pub fn extract(target: &str, mode: &str, result: Value) -> Self {
        Output::Extract {
            action: "extract".into(),
            target: target.into(),
            mode: mode.into(),
            result,
        }
    }

    pub fn screenshot(target: &str, base64: String) -> Self {
        Output::Screenshot {
            action: "screenshot".into(),
            target: target.into(),
            format: "png".into(),
            base64,
        }
    }

    pub fn unrecognized(action: &str) -> Self {
        Output::Unrecognized {
            action: action.into(),
            error: "unknown action".into(),
        }
    }
}

/// Per-step diagnostic record captured when tracing is enabled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub index: usize,
    pub action: String,
    pub target: String,
    pub value: Value,
    pub url: String,
    pub title: String,
    pub elapsed_ms: u64,
    pub screenshot_base64: String,
}

/// Final result of one run. Produced once, never mutated after return.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    pub ok: bool,
    pub url: String,
    pub title: String,
    pub outputs: Vec<Output>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<TraceEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
