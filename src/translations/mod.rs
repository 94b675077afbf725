use anyhow::{Context, Result};
use serde_json::Value;
use tera::{Context as TeraContext, Tera};

use crate::LangMap;
use crate::glossary::Glossary;
use crate::languages::LocaleNames;

const SYSTEM_PROMPT: &str = include_str!("prompts/system_prompt.tera");
const USER_PROMPT: &str = include_str!("prompts/user_prompt.tera");

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub source_lang: String,
    pub target_lang: String,
    /// Domain hint such as "Minecraft Gaming"; omitted when empty.
    pub context: String,
}

pub fn render_system_prompt(
    options: &TranslateOptions,
    names: &LocaleNames,
    glossary: &Glossary,
) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("source_name", &names.display_name(&options.source_lang));
    context.insert("target_name", &names.display_name(&options.target_lang));
    context.insert("context", options.context.trim());
    context.insert("glossary", &glossary.to_json());
    Tera::one_off(SYSTEM_PROMPT, &context, false).with_context(|| "failed to render system prompt")
}

pub fn render_user_prompt(entries: &LangMap) -> Result<String> {
    let payload = serde_json::to_string(entries).with_context(|| "failed to serialize batch")?;
    let mut context = TeraContext::new();
    context.insert("entries", &payload);
    Tera::one_off(USER_PROMPT, &context, false).with_context(|| "failed to render user prompt")
}

/// Parses a completion as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_reply(text: &str) -> serde_json::Result<Value> {
    serde_json::from_str(strip_code_fence(text))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening fence line.
    match body.split_once('\n') {
        Some((info, inner)) if !info.trim_start().starts_with('{') => inner.trim(),
        _ => body.trim(),
    }
}

/// Coerces the shapes models commonly return into a flat key/value map:
///
/// - `{"k": "v", ...}` as is
/// - `{"envelope": {"k": "v"}}` unwrapped
/// - `{"envelope": [{"key": "k", "value": "v"}]}` flattened
/// - `[{"key": "k", "value": "v"}]` or `[{"k": "v"}, {"k2": "v2"}]` flattened
///
/// Anything else, or a result with no entries, yields `None`.
pub fn normalize_response(value: Value) -> Option<LangMap> {
    let map = match value {
        Value::Object(map) if map.len() == 1 => {
            let mut entries = map.into_iter();
            let (key, inner) = entries.next()?;
            match inner {
                Value::Object(inner) => inner,
                Value::Array(records) => flatten_records(records, false),
                other => LangMap::from_iter([(key, other)]),
            }
        }
        Value::Object(map) => map,
        Value::Array(records) => flatten_records(records, true),
        _ => return None,
    };
    (!map.is_empty()).then_some(map)
}

/// `{key, value}` records become entries. Other objects are merged in only
/// when `merge_fragments` is set.
fn flatten_records(records: Vec<Value>, merge_fragments: bool) -> LangMap {
    let mut out = LangMap::new();
    for record in records {
        let Value::Object(mut object) = record else {
            continue;
        };
        if let (Some(Value::String(key)), Some(value)) =
            (object.get("key").cloned(), object.get("value").cloned())
        {
            out.insert(key, value);
        } else if merge_fragments {
            out.append(&mut object);
        }
    }
    out
}
