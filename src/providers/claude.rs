use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    Message, MessageRole, Provider, ProviderFuture, ProviderResponse, ProviderUsage,
    format_error_parts, system_text,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
pub(crate) const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone)]
pub struct Claude {
    key: String,
    model: String,
    temperature: Option<f64>,
    messages: Vec<Message>,
}

impl Default for Claude {
    fn default() -> Self {
        Self::new()
    }
}

impl Claude {
    pub fn new() -> Self {
        Self {
            key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            messages: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    fn request_body(&self) -> Value {
        let system = system_text(&self.messages);
        let messages = self
            .messages
            .iter()
            .filter(|message| message.role == MessageRole::User)
            .map(|message| {
                json!({
                    "role": "user",
                    "content": [{"type": "text", "text": message.text}]
                })
            })
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages,
            "system": if system.trim().is_empty() { Value::Null } else { json!(system) }
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

fn base_url() -> String {
    std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

impl Provider for Claude {
    fn with_api_key(mut self, key: String) -> Self {
        self.key = key;
        self
    }

    fn append_system_input(mut self, input: String) -> Self {
        self.messages.push(Message::system(input));
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.messages.push(Message::user(input));
        self
    }

    fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn call_json(self) -> ProviderFuture {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let url = base_url();
            let body = self.request_body();
            debug!("claude request: model={}", self.model);

            let response = client
                .post(&url)
                .header("x-api-key", self.key.clone())
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_text_response(&text, &self.model);
            }
            Err(anyhow!(
                "Claude API error ({}): {}",
                status,
                extract_claude_error(&text).unwrap_or(text)
            ))
        })
    }
}

fn extract_text_response(text: &str, fallback_model: &str) -> Result<ProviderResponse> {
    let payload: ClaudeResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Claude response JSON: {}", err))?;
    let content = payload
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<String>();
    if content.trim().is_empty() {
        return Err(anyhow!("no text returned from Claude"));
    }

    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage
            .input_tokens
            .zip(usage.output_tokens)
            .map(|(input, output)| input + output),
    });
    Ok(ProviderResponse {
        text: content,
        model,
        usage,
    })
}

fn extract_claude_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<ClaudeError>,
    }

    #[derive(Deserialize)]
    struct ClaudeError {
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(error.message, error.kind, None))
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
    model: Option<String>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_goes_to_top_level_field() {
        let body = Claude::new()
            .append_system_input("Translate.".to_string())
            .append_user_input("{}".to_string())
            .request_body();
        assert_eq!(body["system"], "Translate.");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn key_is_supplied_after_construction() {
        let provider = Claude::new();
        assert!(provider.key.is_empty());
        let provider = provider.with_api_key("sk-ant-test".to_string());
        assert_eq!(provider.key, "sk-ant-test");
    }

    #[test]
    fn joins_text_blocks_and_sums_usage() {
        let payload = r#"{
            "model": "claude-sonnet-4-5-20250929",
            "content": [{"type": "text", "text": "{\"a\": "}, {"type": "text", "text": "\"世界\"}"}],
            "usage": {"input_tokens": 20, "output_tokens": 6}
        }"#;
        let response = extract_text_response(payload, DEFAULT_MODEL).unwrap();
        assert_eq!(response.text, "{\"a\": \"世界\"}");
        assert_eq!(response.usage.unwrap().total_tokens, Some(26));
    }

    #[test]
    fn error_body_is_summarized() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        assert_eq!(
            extract_claude_error(body).as_deref(),
            Some("Overloaded | type: overloaded_error")
        );
    }
}
