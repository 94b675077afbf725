use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::LangMap;
use crate::batch::Batch;
use crate::error::BatchError;
use crate::glossary::Glossary;
use crate::languages::LocaleNames;
use crate::providers::{Provider, ProviderUsage};
use crate::translations::{self, TranslateOptions};

/// Sends batches to a provider and enforces the flat key/value contract on
/// what comes back.
#[derive(Debug, Clone)]
pub struct Translator<P: Provider> {
    provider: P,
    system_prompt: String,
    temperature: f64,
}

#[derive(Debug, Clone)]
pub struct BatchTranslation {
    pub entries: LangMap,
    /// Entries in the reply that were not requested or had no usable value.
    pub dropped: usize,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

impl<P: Provider> Translator<P> {
    pub fn new(
        provider: P,
        names: &LocaleNames,
        glossary: &Glossary,
        options: &TranslateOptions,
        temperature: f64,
    ) -> Result<Self> {
        let system_prompt = translations::render_system_prompt(options, names, glossary)?;
        Ok(Self {
            provider,
            system_prompt,
            temperature,
        })
    }

    /// A single attempt; the caller decides what to do with a failure.
    pub async fn translate_batch(&self, batch: &Batch) -> Result<BatchTranslation, BatchError> {
        let user_prompt =
            translations::render_user_prompt(&batch.entries).map_err(BatchError::Prompt)?;
        let response = self
            .provider
            .clone()
            .with_temperature(self.temperature)
            .append_system_input(self.system_prompt.clone())
            .append_user_input(user_prompt)
            .call_json()
            .await
            .map_err(BatchError::Transport)?;

        let value = translations::parse_reply(&response.text).map_err(BatchError::InvalidJson)?;
        let normalized = translations::normalize_response(value).ok_or(BatchError::Shape)?;
        let (entries, dropped) = accept_entries(&batch.entries, normalized);
        if dropped > 0 {
            debug!(
                "batch {}/{}: dropped {} unexpected entries",
                batch.index, batch.total, dropped
            );
        }
        if entries.is_empty() {
            return Err(BatchError::Shape);
        }
        Ok(BatchTranslation {
            entries,
            dropped,
            model: response.model,
            usage: response.usage,
        })
    }
}

/// Keeps replies for requested keys with a non-empty string value.
fn accept_entries(requested: &LangMap, reply: LangMap) -> (LangMap, usize) {
    let mut accepted = LangMap::new();
    let mut dropped = 0;
    for (key, value) in reply {
        match value {
            Value::String(text) if requested.contains_key(&key) && !text.trim().is_empty() => {
                accepted.insert(key, Value::String(text));
            }
            _ => dropped += 1,
        }
    }
    (accepted, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> LangMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn only_requested_non_empty_strings_are_accepted() {
        let requested = map(json!({"a": "Hello", "b": "World", "c": "Cat"}));
        let reply = map(json!({"a": "こんにちは", "b": "  ", "c": 3, "z": "余計"}));
        let (accepted, dropped) = accept_entries(&requested, reply);
        assert_eq!(Value::Object(accepted), json!({"a": "こんにちは"}));
        assert_eq!(dropped, 3);
    }
}
