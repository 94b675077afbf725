use anyhow::Result;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::LangMap;
use crate::batch::split_batches;
use crate::commit::{self, CommitOutcome};
use crate::diff::{self, TargetRepair};
use crate::discover::{LocaleCollection, LocaleDiscoverer};
use crate::error::RunError;
use crate::glossary::load_glossary;
use crate::languages::LocaleNames;
use crate::progress::{Progress, ProgressEvent, SkipReason};
use crate::providers::Provider;
use crate::settings::{MIN_BATCH_DELAY, Settings};
use crate::translations::TranslateOptions;
use crate::translator::Translator;

/// Everything one run needs, resolved up front. The API key is checked when
/// the run starts and handed to the provider; nothing here reads the
/// environment. `batch_delay` never goes below `MIN_BATCH_DELAY`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    pub source_lang: String,
    pub target_lang: String,
    pub glossary_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub batch_size: NonZeroUsize,
    pub batch_delay: Duration,
    pub temperature: f64,
    pub folder_name: String,
    pub context: String,
    pub dry_run: bool,
}

impl RunConfig {
    pub fn new(
        root: impl Into<PathBuf>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self::from_settings(root, source_lang, target_lang, &Settings::default())
    }

    pub fn from_settings(
        root: impl Into<PathBuf>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        settings: &Settings,
    ) -> Self {
        Self {
            root: root.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            glossary_path: None,
            api_key: None,
            batch_size: settings.batch_size,
            batch_delay: settings.batch_delay,
            temperature: settings.temperature,
            folder_name: settings.folder_name.clone(),
            context: settings.context.clone(),
            dry_run: false,
        }
    }

    pub fn api_key(&self) -> Result<&str, RunError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(RunError::MissingApiKey)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pairs_found: usize,
    pub pairs_skipped: usize,
    pub pairs_written: usize,
    pub pairs_unchanged: usize,
    pub entries_added: usize,
    pub batches_failed: usize,
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PairStatus {
    Skipped,
    UpToDate,
    Planned,
    Written { added: usize },
    Unchanged,
    PersistFailed,
}

#[derive(Debug)]
struct PairOutcome {
    status: PairStatus,
    batches_failed: usize,
    interrupted: bool,
}

impl PairOutcome {
    fn finished(status: PairStatus) -> Self {
        Self {
            status,
            batches_failed: 0,
            interrupted: false,
        }
    }
}

impl RunSummary {
    fn record(&mut self, outcome: &PairOutcome) {
        self.pairs_found += 1;
        self.batches_failed += outcome.batches_failed;
        match outcome.status {
            PairStatus::Skipped | PairStatus::PersistFailed => self.pairs_skipped += 1,
            PairStatus::Written { added } => {
                self.pairs_written += 1;
                self.entries_added += added;
            }
            PairStatus::UpToDate | PairStatus::Planned | PairStatus::Unchanged => {
                self.pairs_unchanged += 1
            }
        }
        self.interrupted |= outcome.interrupted;
    }
}

/// Runs discovery, diff, batched translation and persistence over a tree,
/// one collection and one batch at a time.
#[derive(Debug)]
pub struct Pipeline<P: Provider> {
    config: RunConfig,
    provider: P,
    names: LocaleNames,
}

impl<P: Provider> Pipeline<P> {
    pub fn new(config: RunConfig, provider: P) -> Result<Self> {
        Ok(Self {
            config,
            provider,
            names: LocaleNames::load()?,
        })
    }

    /// Fails only on a missing API key (outside dry runs) or a missing root.
    /// Everything else is reported through `progress` and leaves the affected
    /// entries untranslated for the next run.
    pub async fn run(
        &self,
        progress: &mut dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let config = &self.config;
        // Dry runs never reach the provider, so they need no credential.
        let provider = if config.dry_run {
            self.provider.clone()
        } else {
            self.provider.clone().with_api_key(config.api_key()?.to_string())
        };
        if !config.root.is_dir() {
            return Err(RunError::MissingRoot(config.root.clone()));
        }
        for code in [&config.source_lang, &config.target_lang] {
            if !self.names.is_known(code) {
                debug!("locale '{}' has no display name; using the code as is", code);
            }
        }

        let glossary = load_glossary(
            config.glossary_path.as_deref(),
            &config.source_lang,
            &config.target_lang,
        );
        if !glossary.is_empty() {
            info!(
                "glossary ({} -> {}): {} terms",
                config.source_lang,
                config.target_lang,
                glossary.len()
            );
        }
        progress.report(&ProgressEvent::RunStarted {
            root: config.root.display().to_string(),
            source_file: format!("{}.json", config.source_lang),
            target_file: format!("{}.json", config.target_lang),
            glossary_terms: glossary.len(),
            dry_run: config.dry_run,
        });

        let options = TranslateOptions {
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            context: config.context.clone(),
        };
        // Rendering a built-in template with plain strings cannot fail in
        // practice; if it does, every batch is reported as failed instead.
        let translator = Translator::new(
            provider,
            &self.names,
            &glossary,
            &options,
            config.temperature,
        );
        let translator = match translator {
            Ok(translator) => Some(translator),
            Err(err) => {
                warn!("failed to prepare translation instruction: {:#}", err);
                None
            }
        };

        let discoverer =
            LocaleDiscoverer::new(&config.root, &config.source_lang, &config.target_lang)
                .with_folder_name(config.folder_name.clone());

        let mut summary = RunSummary::default();
        for collection in discoverer.collections() {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            let outcome = self
                .process_collection(translator.as_ref(), &collection, progress, cancel)
                .await;
            summary.record(&outcome);
            if outcome.interrupted {
                break;
            }
        }

        progress.report(&ProgressEvent::Finished(summary.clone()));
        Ok(summary)
    }

    async fn process_collection(
        &self,
        translator: Option<&Translator<P>>,
        collection: &LocaleCollection,
        progress: &mut dyn Progress,
        cancel: &CancellationToken,
    ) -> PairOutcome {
        let config = &self.config;
        progress.report(&ProgressEvent::PairStarted {
            path: collection.display_path(&config.root),
        });

        let diff = match diff::diff_pair(&collection.source_path, &collection.target_path) {
            Ok(Some(diff)) => diff,
            Ok(None) => {
                progress.report(&ProgressEvent::PairSkipped {
                    reason: SkipReason::NotAMapping,
                });
                return PairOutcome::finished(PairStatus::Skipped);
            }
            Err(err) => {
                warn!("{:#}", err);
                progress.report(&ProgressEvent::PairSkipped {
                    reason: SkipReason::Unreadable(format!("{:#}", err)),
                });
                return PairOutcome::finished(PairStatus::Skipped);
            }
        };

        if !matches!(
            diff.target.repair,
            TargetRepair::Loaded | TargetRepair::Absent
        ) {
            warn!(
                "{}: existing content discarded ({:?})",
                collection.target_path.display(),
                diff.target.repair
            );
            progress.report(&ProgressEvent::TargetRepaired {
                repair: diff.target.repair,
            });
        }

        if diff.outstanding.is_empty() {
            progress.report(&ProgressEvent::UpToDate);
            return PairOutcome::finished(PairStatus::UpToDate);
        }

        let batches = split_batches(&diff.outstanding, config.batch_size);
        progress.report(&ProgressEvent::Outstanding {
            entries: diff.outstanding.len(),
            batches: batches.len(),
        });
        if config.dry_run {
            return PairOutcome::finished(PairStatus::Planned);
        }

        let mut translated = LangMap::new();
        let mut batches_failed = 0;
        let mut interrupted = false;
        for batch in &batches {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            progress.report(&ProgressEvent::BatchStarted {
                index: batch.index,
                total: batch.total,
                size: batch.len(),
            });

            let Some(translator) = translator else {
                batches_failed += 1;
                progress.report(&ProgressEvent::BatchFailed {
                    index: batch.index,
                    error: "translation instruction unavailable".to_string(),
                });
                continue;
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = translator.translate_batch(batch) => Some(result),
            };
            match result {
                None => {
                    progress.report(&ProgressEvent::BatchCancelled { index: batch.index });
                    interrupted = true;
                    break;
                }
                Some(Ok(result)) => {
                    debug!(
                        "batch {}/{}: {} accepted, {} dropped (model: {}, tokens: {})",
                        batch.index,
                        batch.total,
                        result.entries.len(),
                        result.dropped,
                        result.model.as_deref().unwrap_or("unknown"),
                        result
                            .usage
                            .as_ref()
                            .and_then(|usage| usage.total_tokens)
                            .map_or_else(|| "n/a".to_string(), |total| total.to_string())
                    );
                    progress.report(&ProgressEvent::BatchSucceeded {
                        index: batch.index,
                        accepted: result.entries.len(),
                    });
                    translated.extend(result.entries);
                }
                Some(Err(err)) => {
                    warn!(
                        "{}: batch {}/{} failed: {}",
                        collection.display_path(&config.root),
                        batch.index,
                        batch.total,
                        err
                    );
                    batches_failed += 1;
                    progress.report(&ProgressEvent::BatchFailed {
                        index: batch.index,
                        error: err.to_string(),
                    });
                }
            }
            tokio::time::sleep(config.batch_delay.max(MIN_BATCH_DELAY)).await;
        }

        let status = match commit::commit(&collection.target_path, diff.target.mapping, &translated)
        {
            Ok(outcome) => {
                progress.report(&ProgressEvent::Persisted {
                    outcome,
                    interrupted,
                });
                match outcome {
                    CommitOutcome::Written { added } => PairStatus::Written { added },
                    CommitOutcome::Unchanged => PairStatus::Unchanged,
                }
            }
            Err(err) => {
                warn!("{:#}", err);
                progress.report(&ProgressEvent::PersistFailed {
                    error: format!("{:#}", err),
                });
                PairStatus::PersistFailed
            }
        };

        PairOutcome {
            status,
            batches_failed,
            interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_must_be_present_and_non_blank() {
        let mut config = RunConfig::new("/tmp", "en_us", "ja_jp");
        assert!(matches!(config.api_key(), Err(RunError::MissingApiKey)));
        config.api_key = Some("   ".to_string());
        assert!(matches!(config.api_key(), Err(RunError::MissingApiKey)));
        config.api_key = Some("secret".to_string());
        assert_eq!(config.api_key().unwrap(), "secret");
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(&PairOutcome::finished(PairStatus::Skipped));
        summary.record(&PairOutcome {
            status: PairStatus::Written { added: 4 },
            batches_failed: 1,
            interrupted: false,
        });
        summary.record(&PairOutcome {
            status: PairStatus::Unchanged,
            batches_failed: 2,
            interrupted: true,
        });
        assert_eq!(
            summary,
            RunSummary {
                pairs_found: 3,
                pairs_skipped: 1,
                pairs_written: 1,
                pairs_unchanged: 1,
                entries_added: 4,
                batches_failed: 3,
                interrupted: true,
            }
        );
    }
}
