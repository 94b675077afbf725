use anyhow::{Context, Result};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod batch;
pub mod commit;
pub mod diff;
pub mod discover;
pub mod error;
pub mod glossary;
pub mod languages;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translations;
pub mod translator;

pub use error::{BatchError, RunError};
pub use pipeline::{Pipeline, RunConfig, RunSummary};
pub use progress::{ConsoleProgress, Progress, ProgressEvent, RecordedProgress};
pub use providers::{Provider, ProviderKind, ProviderResponse};

/// A flat locale mapping. Key order follows the file it was read from.
pub type LangMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub source_lang: String,
    pub target_lang: String,
    pub glossary: Option<PathBuf>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub batch_size: Option<NonZeroUsize>,
    pub dry_run: bool,
    pub settings_path: Option<PathBuf>,
}

/// Resolves settings and credentials, then runs the pipeline with console
/// output until it finishes or Ctrl+C is pressed.
pub async fn run(config: Config) -> Result<RunSummary> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;

    let model_arg = config.model.as_deref().or(settings.model.as_deref());
    let selection = providers::resolve_provider_selection(model_arg)?;
    let key = providers::resolve_key(selection.provider, config.key.as_deref());
    debug!(
        "provider: {} (model: {})",
        selection.provider.as_str(),
        selection
            .requested_model
            .as_deref()
            .unwrap_or(selection.provider.default_model())
    );

    let mut run_config = RunConfig::from_settings(
        &config.root,
        config.source_lang.trim(),
        config.target_lang.trim(),
        &settings,
    );
    run_config.glossary_path = config.glossary.clone();
    run_config.api_key = key;
    run_config.dry_run = config.dry_run;
    if let Some(batch_size) = config.batch_size {
        run_config.batch_size = batch_size;
    }
    let provider = providers::build_provider(selection.provider, selection.requested_model);
    let pipeline = Pipeline::new(run_config, provider)?;

    let cancel = CancellationToken::new();
    let signal = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let mut progress = ConsoleProgress;
    let result = pipeline.run(&mut progress, &cancel).await;
    signal.abort();

    result.with_context(|| format!("run aborted for {}", config.root.display()))
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("\nStopping after the current batch...");
        cancel.cancel();
    }
}
