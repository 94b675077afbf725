use std::io::{self, Write};

use crate::commit::CommitOutcome;
use crate::diff::TargetRepair;
use crate::pipeline::RunSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source file is valid JSON but not a key/value object.
    NotAMapping,
    /// The source file could not be read or parsed.
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        root: String,
        source_file: String,
        target_file: String,
        glossary_terms: usize,
        dry_run: bool,
    },
    PairStarted {
        path: String,
    },
    PairSkipped {
        reason: SkipReason,
    },
    TargetRepaired {
        repair: TargetRepair,
    },
    UpToDate,
    Outstanding {
        entries: usize,
        batches: usize,
    },
    BatchStarted {
        index: usize,
        total: usize,
        size: usize,
    },
    BatchSucceeded {
        index: usize,
        accepted: usize,
    },
    BatchFailed {
        index: usize,
        error: String,
    },
    BatchCancelled {
        index: usize,
    },
    Persisted {
        outcome: CommitOutcome,
        interrupted: bool,
    },
    PersistFailed {
        error: String,
    },
    Finished(RunSummary),
}

pub trait Progress {
    fn report(&mut self, event: &ProgressEvent);
}

/// Line-oriented output on stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn report(&mut self, event: &ProgressEvent) {
        let Some(line) = describe(event) else {
            return;
        };
        // The batch outcome completes this line.
        if matches!(event, ProgressEvent::BatchStarted { .. }) {
            print!("{} ...", line);
            let _ = io::stdout().flush();
        } else {
            println!("{}", line);
        }
    }
}

fn describe(event: &ProgressEvent) -> Option<String> {
    let line = match event {
        ProgressEvent::RunStarted {
            root,
            source_file,
            target_file,
            glossary_terms,
            dry_run,
        } => {
            let mut lines = vec![
                format!("Scanning: {}", root),
                format!("Files: {} -> {}", source_file, target_file),
            ];
            if *glossary_terms > 0 {
                lines.push(format!("Glossary: {} terms", glossary_terms));
            }
            if *dry_run {
                lines.push("Dry run: nothing will be sent or written.".to_string());
            } else {
                lines.push("Press Ctrl+C to stop; finished batches are saved first.".to_string());
            }
            lines.join("\n")
        }
        ProgressEvent::PairStarted { path } => format!("\n[{}]", path),
        ProgressEvent::PairSkipped { reason } => match reason {
            SkipReason::NotAMapping => "  -> skipped: source is not a key/value object".to_string(),
            SkipReason::Unreadable(error) => format!("  -> skipped: {}", error),
        },
        ProgressEvent::TargetRepaired { repair } => match repair {
            TargetRepair::ResetFromList => {
                "  [repair] target was a list; starting from an empty mapping".to_string()
            }
            TargetRepair::ResetFromOtherShape => {
                "  [repair] target was not an object; starting from an empty mapping".to_string()
            }
            TargetRepair::ResetUnreadable => {
                "  [repair] target could not be parsed; starting from an empty mapping".to_string()
            }
            TargetRepair::Loaded | TargetRepair::Absent => return None,
        },
        ProgressEvent::UpToDate => "  -> up to date".to_string(),
        ProgressEvent::Outstanding { entries, batches } => {
            format!("  -> untranslated: {} entries / {} batches", entries, batches)
        }
        ProgressEvent::BatchStarted { index, total, size } => {
            format!("    - Batch {}/{} ({} entries)", index, total, size)
        }
        ProgressEvent::BatchSucceeded { accepted, .. } => format!(" OK ({})", accepted),
        ProgressEvent::BatchFailed { index, error } => format!(
            " failed: {}\n    [warn] batch {} skipped; its keys stay untranslated",
            error, index
        ),
        ProgressEvent::BatchCancelled { .. } => " cancelled".to_string(),
        ProgressEvent::Persisted {
            outcome,
            interrupted,
        } => match outcome {
            CommitOutcome::Written { added } if *interrupted => {
                format!("  -> saved: +{} entries (interrupted)", added)
            }
            CommitOutcome::Written { added } => format!("  -> saved: +{} entries", added),
            CommitOutcome::Unchanged => "  -> nothing added".to_string(),
        },
        ProgressEvent::PersistFailed { error } => format!("  [error] save failed: {}", error),
        ProgressEvent::Finished(summary) => {
            let mut line = format!(
                "\nDone: {} collections, {} saved, {} unchanged, {} skipped, +{} entries, {} failed batches",
                summary.pairs_found,
                summary.pairs_written,
                summary.pairs_unchanged,
                summary.pairs_skipped,
                summary.entries_added,
                summary.batches_failed
            );
            if summary.interrupted {
                line.push_str("\nStopped early on request.");
            }
            line
        }
    };
    Some(line)
}

/// Keeps every event; used by tests and callers embedding the pipeline.
#[derive(Debug, Default)]
pub struct RecordedProgress {
    pub events: Vec<ProgressEvent>,
}

impl Progress for RecordedProgress {
    fn report(&mut self, event: &ProgressEvent) {
        self.events.push(event.clone());
    }
}

impl RecordedProgress {
    /// Sizes of the batches started, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::BatchStarted { size, .. } => Some(*size),
                _ => None,
            })
            .collect()
    }
}
