use std::env;

use tracing::warn;

use crate::error::AgentError;

/// Immutable process configuration, loaded once at startup and threaded
/// into the planner client, the runner, and the gateway.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the text-generation provider. May be empty; the
    /// provider will reject planning requests in that case.
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Optional attribution headers forwarded to the provider.
    pub referer: Option<String>,
    pub title: Option<String>,
    /// WebSocket endpoint of the remote browser host. Required.
    pub browser_ws: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, AgentError> {
        let browser_ws = env::var("BROWSER_WS_URL")
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        if browser_ws.is_empty() {
            return Err(AgentError::Configuration(
                "BROWSER_WS_URL is required".into(),
            ));
        }

        let api_key = env::var("OPENROUTER_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            warn!("OPENROUTER_API_KEY is not set; planning requests will fail upstream");
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| {
                AgentError::Configuration(format!("PORT is not a valid port number: {raw}"))
            })?,
            Err(_) => 3000,
        };

        Ok(Self {
            api_key,
            model: env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "google/gemini-2.5-flash-lite".to_string()),
            base_url: env::var("OPENROUTER_BASE")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            referer: env::var("OPENROUTER_REFERER").ok().filter(|v| !v.is_empty()),
            title: Some(
                env::var("OPENROUTER_TITLE").unwrap_or_else(|_| "Agent Brain (webpilot)".to_string()),
            )
            .filter(|v| !v.is_empty()),
            browser_ws,
            port,
        })
    }
}
