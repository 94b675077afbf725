use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::discover::DEFAULT_FOLDER_NAME;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".modlang-translator";
/// Shortest pause allowed between two requests.
pub const MIN_BATCH_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub batch_size: NonZeroUsize,
    pub batch_delay: Duration,
    pub temperature: f64,
    pub folder_name: String,
    pub context: String,
    pub model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(1000),
            temperature: 0.1,
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            context: "Minecraft Gaming".to_string(),
            model: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translate: Option<TranslateSettings>,
    provider: Option<ProviderSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    batch_size: Option<usize>,
    batch_delay_ms: Option<u64>,
    temperature: Option<f64>,
    folder_name: Option<String>,
    context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSettings {
    model: Option<String>,
}

/// Built-in defaults, then `./settings.toml`, `./settings.local.toml`, the
/// same two files under `~/.modlang-translator`, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(parse_settings(DEFAULT_SETTINGS_TOML, Path::new("<built-in>"))?);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge(parse_settings(&content, &path)?);
        }
    }

    Ok(settings)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content).with_context(|| format!("failed to parse settings: {}", path.display()))
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(translate) = incoming.translate {
            if let Some(size) = translate.batch_size.and_then(NonZeroUsize::new) {
                self.batch_size = size;
            }
            if let Some(delay) = translate.batch_delay_ms {
                self.batch_delay = Duration::from_millis(delay).max(MIN_BATCH_DELAY);
            }
            if let Some(temperature) = translate.temperature {
                if temperature.is_finite() && temperature >= 0.0 {
                    self.temperature = temperature;
                }
            }
            if let Some(folder_name) = translate.folder_name {
                if !folder_name.trim().is_empty() {
                    self.folder_name = folder_name.trim().to_string();
                }
            }
            if let Some(context) = translate.context {
                if !context.trim().is_empty() {
                    self.context = context.trim().to_string();
                }
            }
        }
        if let Some(provider) = incoming.provider {
            if let Some(model) = provider.model {
                if !model.trim().is_empty() {
                    self.model = Some(model.trim().to_string());
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}
