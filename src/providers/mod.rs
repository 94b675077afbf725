use anyhow::{Result, anyhow};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

mod claude;
mod gemini;
mod openai;

pub use claude::Claude;
pub use gemini::Gemini;
pub use openai::OpenAI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAI,
    Claude,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Claude => "claude",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::OpenAI => openai::DEFAULT_MODEL,
            ProviderKind::Claude => claude::DEFAULT_MODEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub provider: ProviderKind,
    pub requested_model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Raw completion text; callers decide how to interpret it.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
}

impl Message {
    pub fn system(text: String) -> Self {
        Self {
            role: MessageRole::System,
            text,
        }
    }

    pub fn user(text: String) -> Self {
        Self {
            role: MessageRole::User,
            text,
        }
    }
}

pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<ProviderResponse>> + Send>>;

/// The external translation capability. Implementations are cheap to clone;
/// each call starts from a clone and consumes it. The credential is supplied
/// by the pipeline once it has been checked.
pub trait Provider: Clone + Send + Sync {
    fn with_api_key(self, key: String) -> Self;
    fn append_system_input(self, input: String) -> Self;
    fn append_user_input(self, input: String) -> Self;
    fn with_temperature(self, temperature: f64) -> Self;
    /// One request asking for a JSON object reply. No retries.
    fn call_json(self) -> ProviderFuture;
}

#[derive(Debug, Clone)]
pub enum ProviderImpl {
    Gemini(Gemini),
    OpenAI(OpenAI),
    Claude(Claude),
}

impl Provider for ProviderImpl {
    fn with_api_key(self, key: String) -> Self {
        match self {
            ProviderImpl::Gemini(provider) => ProviderImpl::Gemini(provider.with_api_key(key)),
            ProviderImpl::OpenAI(provider) => ProviderImpl::OpenAI(provider.with_api_key(key)),
            ProviderImpl::Claude(provider) => ProviderImpl::Claude(provider.with_api_key(key)),
        }
    }

    fn append_system_input(self, input: String) -> Self {
        match self {
            ProviderImpl::Gemini(provider) => {
                ProviderImpl::Gemini(provider.append_system_input(input))
            }
            ProviderImpl::OpenAI(provider) => {
                ProviderImpl::OpenAI(provider.append_system_input(input))
            }
            ProviderImpl::Claude(provider) => {
                ProviderImpl::Claude(provider.append_system_input(input))
            }
        }
    }

    fn append_user_input(self, input: String) -> Self {
        match self {
            ProviderImpl::Gemini(provider) => {
                ProviderImpl::Gemini(provider.append_user_input(input))
            }
            ProviderImpl::OpenAI(provider) => {
                ProviderImpl::OpenAI(provider.append_user_input(input))
            }
            ProviderImpl::Claude(provider) => {
                ProviderImpl::Claude(provider.append_user_input(input))
            }
        }
    }

    fn with_temperature(self, temperature: f64) -> Self {
        match self {
            ProviderImpl::Gemini(provider) => {
                ProviderImpl::Gemini(provider.with_temperature(temperature))
            }
            ProviderImpl::OpenAI(provider) => {
                ProviderImpl::OpenAI(provider.with_temperature(temperature))
            }
            ProviderImpl::Claude(provider) => {
                ProviderImpl::Claude(provider.with_temperature(temperature))
            }
        }
    }

    fn call_json(self) -> ProviderFuture {
        match self {
            ProviderImpl::Gemini(provider) => provider.call_json(),
            ProviderImpl::OpenAI(provider) => provider.call_json(),
            ProviderImpl::Claude(provider) => provider.call_json(),
        }
    }
}

pub fn build_provider(provider: ProviderKind, model: Option<String>) -> ProviderImpl {
    let model = model.unwrap_or_else(|| provider.default_model().to_string());
    match provider {
        ProviderKind::Gemini => ProviderImpl::Gemini(Gemini::new().with_model(model)),
        ProviderKind::OpenAI => ProviderImpl::OpenAI(OpenAI::new().with_model(model)),
        ProviderKind::Claude => ProviderImpl::Claude(Claude::new().with_model(model)),
    }
}

/// `model_arg` is `provider` or `provider:model`. Without it, the first
/// provider with a key in the environment wins, falling back to Gemini.
pub fn resolve_provider_selection(model_arg: Option<&str>) -> Result<ProviderSelection> {
    match model_arg {
        Some(model) => parse_model_arg(model),
        None => Ok(default_provider_selection()),
    }
}

pub fn resolve_key(provider: ProviderKind, override_key: Option<&str>) -> Option<String> {
    if let Some(key) = override_key.filter(|key| !key.trim().is_empty()) {
        return Some(key.trim().to_string());
    }

    match provider {
        ProviderKind::Gemini => get_env("GEMINI_API_KEY").or_else(|| get_env("GOOGLE_API_KEY")),
        ProviderKind::OpenAI => get_env("OPENAI_API_KEY"),
        ProviderKind::Claude => get_env("ANTHROPIC_API_KEY"),
    }
}

fn default_provider_selection() -> ProviderSelection {
    let provider = if get_env("GEMINI_API_KEY").is_some() || get_env("GOOGLE_API_KEY").is_some() {
        ProviderKind::Gemini
    } else if get_env("OPENAI_API_KEY").is_some() {
        ProviderKind::OpenAI
    } else if get_env("ANTHROPIC_API_KEY").is_some() {
        ProviderKind::Claude
    } else {
        ProviderKind::Gemini
    };
    ProviderSelection {
        provider,
        requested_model: None,
    }
}

fn parse_model_arg(model_arg: &str) -> Result<ProviderSelection> {
    let raw = model_arg.trim();
    if raw.is_empty() {
        return Err(anyhow!("model argument is empty"));
    }

    if let Some(provider) = provider_from_name(&raw.to_lowercase()) {
        return Ok(ProviderSelection {
            provider,
            requested_model: None,
        });
    }

    if let Some((provider_part, model_part)) = raw.split_once(':') {
        if let Some(provider) = provider_from_name(&provider_part.trim().to_lowercase()) {
            let model = model_part.trim();
            return Ok(ProviderSelection {
                provider,
                requested_model: (!model.is_empty()).then(|| model.to_string()),
            });
        }
    }

    Err(anyhow!(
        "unable to infer provider from model '{}'. Use provider:model (gemini:, openai:, claude:)",
        raw
    ))
}

fn provider_from_name(name: &str) -> Option<ProviderKind> {
    match name {
        "gemini" | "google" => Some(ProviderKind::Gemini),
        "openai" => Some(ProviderKind::OpenAI),
        "claude" | "anthropic" => Some(ProviderKind::Claude),
        _ => None,
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub(crate) fn system_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|message| message.role == MessageRole::System)
        .map(|message| message.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(crate) fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = code
        && !code.trim().is_empty()
    {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}
