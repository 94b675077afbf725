use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Forced terminology for one source/target language pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Glossary {
    terms: Map<String, Value>,
}

impl Glossary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.terms.get(source).and_then(Value::as_str)
    }

    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.terms.insert(source.into(), Value::String(target.into()));
    }

    /// Rendered into the translation instruction as a JSON object.
    pub fn to_json(&self) -> String {
        Value::Object(self.terms.clone()).to_string()
    }
}

/// Loads the glossary for `source_lang -> target_lang` from a CSV file whose
/// header names the language codes. Every problem with the file degrades to
/// an empty glossary with a warning; the run never stops over it.
pub fn load_glossary(path: Option<&Path>, source_lang: &str, target_lang: &str) -> Glossary {
    let Some(path) = path else {
        return Glossary::default();
    };
    if !path.exists() {
        warn!("glossary file not found: {}", path.display());
        return Glossary::default();
    }
    match read_glossary(path, source_lang, target_lang) {
        Ok(Some(glossary)) => glossary,
        Ok(None) => {
            warn!(
                "glossary {} has no '{}' or '{}' column; glossary not applied",
                path.display(),
                source_lang,
                target_lang
            );
            Glossary::default()
        }
        Err(err) => {
            warn!("failed to load glossary {}: {:#}", path.display(), err);
            Glossary::default()
        }
    }
}

fn read_glossary(path: &Path, source_lang: &str, target_lang: &str) -> Result<Option<Glossary>> {
    let content = fs::read(path)
        .with_context(|| format!("failed to read glossary: {}", path.display()))?;
    parse_glossary(&content, source_lang, target_lang)
}

/// Returns `None` when either language column is missing. Duplicate source
/// terms keep the last row's translation; malformed rows are skipped.
pub(crate) fn parse_glossary(
    content: &[u8],
    source_lang: &str,
    target_lang: &str,
) -> Result<Option<Glossary>> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content);

    let headers = reader
        .headers()
        .with_context(|| "failed to read glossary header")?
        .clone();
    let column = |name: &str| headers.iter().position(|header| header == name);
    let (Some(source_col), Some(target_col)) = (column(source_lang), column(target_lang)) else {
        return Ok(None);
    };

    let mut glossary = Glossary::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("skipping malformed glossary row: {}", err);
                continue;
            }
        };
        let source = record.get(source_col).unwrap_or_default().trim();
        let target = record.get(target_col).unwrap_or_default().trim();
        if !source.is_empty() && !target.is_empty() {
            if let Some(previous) = glossary.get(source) {
                debug!("glossary term '{}' redefined: '{}' -> '{}'", source, previous, target);
            }
            glossary.insert(source, target);
        }
    }
    Ok(Some(glossary))
}
