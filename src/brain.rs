use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AgentError;
use crate::types::{Plan, validate};

/// Upper bound on one planning request.
const PLANNER_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = r#"You are a web action planner for an API-controlled browser.
Respond ONLY with valid JSON matching this schema:
{
  "steps": [
    { "action": "goto|click|type|press|wait|extract|screenshot|done", "target": "<css selector|text=...|role=role:name>", "value": "<text|key|target|milliseconds, optional>" }
  ]
}
Rules:
- At most 12 steps.
- If a startUrl is provided, the first step MUST be {"action":"goto","target":"<startUrl>"}.
- Use "text=" when the target is visible text (e.g. "text=More information").
- Use "role=" with an optional name after ':' for accessibility roles (e.g. "role=button:Submit").
- For "type", put the selector in "target" and the text in "value".
- ALWAYS add an extraction at the end (e.g. {"action":"extract","target":"body","value":"text"}).
- Only add "screenshot" when the user asks for one.
- Finish with {"action":"done","target":"","value":"<short summary>"}.
"#;

/// Client for the text-generation service that produces action plans.
pub struct Brain {
    client: Client,
    config: Arc<Config>,
}

impl Brain {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Ask the model for a plan toward `goal`, optionally anchored at
    /// `start_url`. One attempt; failures are surfaced, not retried.
    pub async fn plan(&self, goal: &str, start_url: &str) -> Result<Plan, AgentError> {
        let user = if start_url.is_empty() {
            format!("Goal: {goal}")
        } else {
            format!("Goal: {goal}\nstartUrl: {start_url}")
        };
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user },
            ],
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .timeout(PLANNER_TIMEOUT)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(referer) = &self.config.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            request = request.header("X-Title", title);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown provider error")
                .to_string();
            warn!(%status, %message, "planner request rejected");
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("{}");
        debug!(chars = content.len(), "model replied");
        parse_plan_text(content)
    }
}

/// Strict JSON parse with a single salvage attempt on the outermost
/// brace-delimited substring. No iterative repair: if the salvage fails
/// too, the output is rejected.
pub fn parse_plan_text(text: &str) -> Result<Plan, AgentError> {
    let candidate = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => salvage_json(text).ok_or(AgentError::InvalidModelOutput)?,
    };
    validate(&candidate)
}

fn salvage_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
