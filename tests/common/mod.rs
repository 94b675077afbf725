#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use modlang_translator::providers::{ProviderFuture, ProviderResponse};
use modlang_translator::{LangMap, Provider, RunConfig};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// What the scripted service does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Returns this completion text verbatim.
    Text(String),
    /// The call fails at the transport level.
    Fail(String),
    /// Returns every requested entry with `[ja] ` prepended to its value.
    Translate,
    /// Same as `Translate`, but cancels the token before answering.
    TranslateThenCancel(CancellationToken),
    /// Cancels the token and never answers.
    CancelAndHang(CancellationToken),
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub system_prompts: Vec<String>,
    /// Requested keys per call, in request order.
    pub requested: Vec<Vec<String>>,
    pub temperatures: Vec<Option<f64>>,
    pub api_keys: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Reply>>>,
    log: Arc<Mutex<CallLog>>,
    system: Vec<String>,
    user: Vec<String>,
    temperature: Option<f64>,
    api_key: Option<String>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().requested.len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl Provider for ScriptedProvider {
    fn with_api_key(mut self, key: String) -> Self {
        self.api_key = Some(key);
        self
    }

    fn append_system_input(mut self, input: String) -> Self {
        self.system.push(input);
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.user.push(input);
        self
    }

    fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn call_json(self) -> ProviderFuture {
        Box::pin(async move {
            let entries = requested_entries(&self.user.join("\n"));
            {
                let mut log = self.log.lock().unwrap();
                log.system_prompts.push(self.system.join("\n\n"));
                log.requested.push(entries.keys().cloned().collect());
                log.temperatures.push(self.temperature);
                log.api_keys.push(self.api_key.clone());
            }
            let reply = self.script.lock().unwrap().pop_front();
            let text = match reply {
                Some(Reply::Text(text)) => text,
                Some(Reply::Fail(message)) => return Err(anyhow!(message)),
                Some(Reply::Translate) => translate_all(&entries),
                Some(Reply::TranslateThenCancel(token)) => {
                    token.cancel();
                    translate_all(&entries)
                }
                Some(Reply::CancelAndHang(token)) => {
                    token.cancel();
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                None => return Err(anyhow!("script exhausted")),
            };
            Ok(ProviderResponse {
                text,
                model: Some("scripted".to_string()),
                usage: None,
            })
        })
    }
}

/// The batch payload is the JSON object on the lines after the instruction.
fn requested_entries(user_prompt: &str) -> LangMap {
    let payload = user_prompt
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    serde_json::from_str(payload.trim()).unwrap_or_default()
}

fn translate_all(entries: &LangMap) -> String {
    let translated = entries
        .iter()
        .map(|(key, value)| {
            let text = value.as_str().unwrap_or_default();
            (key.clone(), Value::String(format!("[ja] {}", text)))
        })
        .collect::<LangMap>();
    Value::Object(translated).to_string()
}

/// Creates `<root>/<relative>/lang/<file>` with the given content.
pub fn write_lang_file(root: &Path, relative: &str, file: &str, content: &str) -> PathBuf {
    let dir = root.join(relative).join("lang");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(file);
    fs::write(&path, content).unwrap();
    path
}

pub fn read_mapping(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

pub fn numbered_source(count: usize) -> String {
    let entries = (1..=count)
        .map(|index| {
            (
                format!("item.key{:03}", index),
                Value::String(format!("Item {}", index)),
            )
        })
        .collect::<LangMap>();
    Value::Object(entries).to_string()
}

pub const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Pipeline tests run on a paused clock, so the delay costs no wall time.
pub fn config(root: &Path) -> RunConfig {
    let mut config = RunConfig::new(root, "en_us", "ja_jp");
    config.api_key = Some("test-key".to_string());
    config.batch_delay = BATCH_DELAY;
    config
}
