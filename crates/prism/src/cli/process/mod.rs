//! The `prism process` command for running originals through the pipeline.

mod batch;
mod setup;
pub mod types;

pub use types::OutputFormat;

use clap::Args;
use prism_core::Config;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use batch::process_events;
use setup::discover_events;

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// File or directory, relative to the bucket directory
    #[arg(default_value = "")]
    pub input: PathBuf,

    /// Bucket name (a directory under the store root)
    #[arg(short, long, default_value = "default")]
    pub bucket: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "jsonl")]
    pub format: OutputFormat,

    /// Number of uploads handled concurrently
    #[arg(short, long, default_value = "4")]
    pub parallel: usize,

    /// Override the configured variant widths (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub widths: Option<Vec<u32>>,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(widths) = &args.widths {
        config.variants.widths = widths.clone();
        config.validate()?;
    }

    let bucket_dir = config.store_root().join(&args.bucket);
    let events = discover_events(&bucket_dir, &args.bucket, &args.input)?;
    if events.is_empty() {
        tracing::warn!("No files found under {:?}", bucket_dir.join(&args.input));
        return Ok(());
    }
    tracing::info!(
        "Processing {} files from bucket {:?} ({} at a time)",
        events.len(),
        args.bucket,
        args.parallel
    );

    let processor = Arc::new(super::local_processor(&config));

    let tally = match &args.output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            let tally =
                process_events(processor, events, args.parallel, args.format, &mut out).await?;
            tracing::info!("Wrote {} outcomes to {:?}", tally.total(), path);
            tally
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            process_events(processor, events, args.parallel, args.format, &mut out).await?
        }
    };

    if tally.failed > 0 {
        anyhow::bail!(
            "{} of {} uploads failed; see {}",
            tally.failed,
            tally.total(),
            config.store_root().join("errors.jsonl").display()
        );
    }
    Ok(())
}
