use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

const LOCALES_TOML: &str = include_str!("locales.toml");

/// Maps locale codes such as `ja_jp` to the language name used in prompts.
#[derive(Debug, Clone)]
pub struct LocaleNames {
    names: HashMap<String, String>,
}

impl LocaleNames {
    pub fn load() -> Result<Self> {
        let parsed: LocalesFile =
            toml::from_str(LOCALES_TOML).with_context(|| "failed to parse locale name table")?;
        let names = parsed
            .names
            .into_iter()
            .map(|(code, name)| (normalize_code(&code), name))
            .collect();
        Ok(LocaleNames { names })
    }

    /// Unknown codes are their own name.
    pub fn display_name(&self, code: &str) -> String {
        self.names
            .get(&normalize_code(code))
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    pub fn is_known(&self, code: &str) -> bool {
        self.names.contains_key(&normalize_code(code))
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
struct LocalesFile {
    names: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve_case_insensitively() {
        let names = LocaleNames::load().unwrap();
        assert_eq!(names.display_name("ja_jp"), "Japanese");
        assert_eq!(names.display_name("ZH_CN"), "Chinese (Simplified)");
        assert!(names.is_known(" en_us "));
    }

    #[test]
    fn unknown_codes_pass_through() {
        let names = LocaleNames::load().unwrap();
        assert_eq!(names.display_name("pt_BR"), "pt_BR");
        assert!(!names.is_known("pt_br"));
    }
}
