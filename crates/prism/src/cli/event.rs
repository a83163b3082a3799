//! The `prism event` command: replay one storage trigger payload.

use clap::Args;
use prism_core::{Config, ProcessOutcome, UploadEvent};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Arguments for the `event` command.
#[derive(Args, Debug)]
pub struct EventArgs {
    /// Trigger JSON document, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,
}

/// Execute the event command.
pub async fn execute(args: EventArgs, config: Config) -> anyhow::Result<()> {
    let raw = read_input(&args.input)?;
    let event = parse_event(&raw)?;

    let processor = super::local_processor(&config);
    let outcome = processor.handle(&event).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    check_outcome(&event, &outcome, &config.store_root().join("errors.jsonl"))
}

/// Turn a failed outcome into a non-zero exit.
fn check_outcome(
    event: &UploadEvent,
    outcome: &ProcessOutcome,
    error_log: &Path,
) -> anyhow::Result<()> {
    if let ProcessOutcome::Failed { error } = outcome {
        anyhow::bail!(
            "Upload {} failed: {}\n\n  Details: {}",
            event.storage_path,
            error,
            error_log.display()
        );
    }
    Ok(())
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    if !input.exists() {
        anyhow::bail!(
            "Event file does not exist: {:?}\n\n  Hint: Pass `-` to read the event from stdin.",
            input
        );
    }
    Ok(std::fs::read_to_string(input)?)
}

fn parse_event(raw: &str) -> anyhow::Result<UploadEvent> {
    serde_json::from_str(raw).map_err(|e| {
        anyhow::anyhow!(
            "Invalid upload event: {e}\n\n  Expected: \
             {{\"storagePath\": \"products/x.jpg\", \"contentType\": \"image/jpeg\", \
             \"size\": 1024, \"bucket\": \"shop\"}}"
        )
    })
}
