//! Concurrent event dispatch with progress and streaming output.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use prism_core::{ImageProcessor, UploadEvent};
use tokio::sync::{mpsc, Semaphore};

use super::types::{EventOutcome, OutputFormat, Tally};

/// Run every event through the processor, at most `parallel` at a time.
///
/// JSONL lines are written as outcomes arrive; JSON output is collected and
/// written as one array in event order.
pub async fn process_events<W: Write>(
    processor: Arc<ImageProcessor>,
    events: Vec<UploadEvent>,
    parallel: usize,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<Tally> {
    let total = events.len();
    let progress = create_progress_bar(total as u64);
    let start_time = Instant::now();

    let semaphore = Arc::new(Semaphore::new(parallel.max(1)));
    let (tx, mut rx) = mpsc::channel::<(usize, EventOutcome)>(parallel.max(1) * 2);

    let dispatcher = tokio::spawn(async move {
        for (index, event) in events.into_iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracing::warn!("Dispatch semaphore closed, stopping batch");
                break;
            };
            let processor = processor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = processor.handle(&event).await;
                drop(permit);
                let line = EventOutcome {
                    storage_path: event.storage_path,
                    outcome,
                };
                // receiver only goes away on an output error
                let _ = tx.send((index, line)).await;
            });
        }
    });

    let mut tally = Tally::default();
    let mut collected: Vec<(usize, EventOutcome)> = Vec::new();

    while let Some((index, line)) = rx.recv().await {
        tally.record(&line.outcome);
        if let prism_core::ProcessOutcome::Failed { error } = &line.outcome {
            progress.println(format!("Failed: {} - {}", line.storage_path, error));
        }

        match format {
            OutputFormat::Jsonl => writeln!(out, "{}", serde_json::to_string(&line)?)?,
            OutputFormat::Json => collected.push((index, line)),
        }

        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!("{:.1} img/sec", tally.total() as f64 / elapsed));
        }
    }
    dispatcher.await?;

    if matches!(format, OutputFormat::Json) {
        collected.sort_by_key(|(index, _)| *index);
        let lines: Vec<EventOutcome> = collected.into_iter().map(|(_, line)| line).collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&lines)?)?;
    }
    out.flush()?;

    progress.finish_and_clear();
    print_summary(&tally, start_time.elapsed());

    Ok(tally)
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after batch processing.
fn print_summary(tally: &Tally, elapsed: Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        tally.total() as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Processed:    {:>8}", tally.processed);
    eprintln!("    Cache hits:   {:>8}", tally.cache_hits);
    if tally.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", tally.skipped);
    }
    if tally.failed > 0 {
        eprintln!("    Failed:       {:>8}", tally.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", tally.total());
    eprintln!("    Variants:     {:>8}", tally.variants);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
}
