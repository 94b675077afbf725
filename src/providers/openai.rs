use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    Message, MessageRole, Provider, ProviderFuture, ProviderResponse, ProviderUsage,
    format_error_parts,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
    temperature: Option<f64>,
    messages: Vec<Message>,
}

impl Default for OpenAI {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAI {
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
        let messages = self
            .messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                };
                json!({"role": role, "content": message.text})
            })
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": {"type": "json_object"}
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

fn base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

impl Provider for OpenAI {
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
            let url = format!("{}/chat/completions", base_url());
            let body = self.request_body();
            debug!("openai request: model={}", self.model);

            let response = client
                .post(&url)
                .bearer_auth(self.key.clone())
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_text_response(&text, &self.model);
            }
            Err(anyhow!(
                "OpenAI API error ({}): {}",
                status,
                extract_openai_error(&text).unwrap_or(text)
            ))
        })
    }
}

fn extract_text_response(text: &str, fallback_model: &str) -> Result<ProviderResponse> {
    let payload: OpenAIResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse OpenAI response JSON: {}", err))?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("no message content returned from OpenAI"))?;

    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });
    Ok(ProviderResponse {
        text: content,
        model,
        usage,
    })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<Value>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let code = error.code.and_then(|code| match code {
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    });
    Some(format_error_parts(error.message, error.kind, code))
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    model: Option<String>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_json_object_format() {
        let body = OpenAI::new()
            .append_system_input("Translate.".to_string())
            .append_user_input("{}".to_string())
            .with_temperature(0.25)
            .request_body();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["temperature"], 0.25);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "{}");
    }

    #[test]
    fn extracts_message_content() {
        let payload = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "{\"a\": \"世界\"}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        }"#;
        let response = extract_text_response(payload, DEFAULT_MODEL).unwrap();
        assert_eq!(response.text, "{\"a\": \"世界\"}");
        assert_eq!(response.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
    }

    #[test]
    fn null_content_is_an_error() {
        let payload = r#"{"choices": [{"message": {"content": null}}]}"#;
        assert!(extract_text_response(payload, DEFAULT_MODEL).is_err());
    }

    #[test]
    fn error_code_may_be_string() {
        let body = r#"{"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}"#;
        assert_eq!(
            extract_openai_error(body).as_deref(),
            Some("Rate limit reached | type: requests | code: rate_limit_exceeded")
        );
    }
}
