use std::path::PathBuf;

use thiserror::Error;

/// Conditions that abort a whole run before any pair is touched.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "no API key found (pass --key or set GEMINI_API_KEY/GOOGLE_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY)"
    )]
    MissingApiKey,
    #[error("directory not found: {}", .0.display())]
    MissingRoot(PathBuf),
}

/// Why a single batch produced nothing usable. The batch's keys stay
/// outstanding and are picked up again by the next run.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to build request: {0:#}")]
    Prompt(anyhow::Error),
    #[error("request failed: {0:#}")]
    Transport(anyhow::Error),
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("could not extract a key/value mapping from the response")]
    Shape,
}
