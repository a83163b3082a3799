//! Output types for the process command.

use clap::ValueEnum;
use prism_core::ProcessOutcome;
use serde::Serialize;

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// One line of process output: the storage path and what happened to it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcome {
    pub storage_path: String,
    #[serde(flatten)]
    pub outcome: ProcessOutcome,
}

/// Running tallies for the summary table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub processed: u64,
    pub cache_hits: u64,
    pub skipped: u64,
    pub failed: u64,
    pub variants: u64,
}

impl Tally {
    pub fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Processed(summary) => {
                self.processed += 1;
                self.variants += summary.variant_count as u64;
            }
            ProcessOutcome::CacheHit { .. } => self.cache_hits += 1,
            ProcessOutcome::Skipped { .. } => self.skipped += 1,
            ProcessOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.processed + self.cache_hits + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{Fingerprint, ProcessSummary, SkipReason};

    #[test]
    fn test_tally() {
        let fp = Fingerprint::from_hex("0123456789abcdef").unwrap();
        let mut tally = Tally::default();
        tally.record(&ProcessOutcome::Processed(ProcessSummary {
            content_hash: fp.clone(),
            variant_count: 12,
            processing_time_ms: 5,
        }));
        tally.record(&ProcessOutcome::CacheHit { content_hash: fp });
        tally.record(&ProcessOutcome::Skipped {
            reason: SkipReason::EmptyFile,
        });
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.variants, 12);
        assert_eq!(tally.failed, 0);
    }

    #[test]
    fn test_event_outcome_is_flat() {
        let line = EventOutcome {
            storage_path: "products/a.jpg".into(),
            outcome: ProcessOutcome::Failed {
                error: "boom".into(),
            },
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["storagePath"], "products/a.jpg");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"], "boom");
    }
}
