use thiserror::Error;

/// Failure taxonomy for planning and execution.
///
/// Step-level action failures inside the runner are contained in the
/// `RunOutcome` and never appear here; these variants cover everything that
/// can go wrong before or around a run.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    #[error("model did not return valid JSON")]
    InvalidModelOutput,

    #[error("planner request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("planner endpoint returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid locator {0:?}: a role is required before ':'")]
    InvalidLocator(String),
}
