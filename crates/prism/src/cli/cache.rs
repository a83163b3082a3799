//! The `prism cache` command: read cache records and resolve variant URLs.

use clap::{Args, Subcommand};
use prism_core::store::LocalCacheStore;
use prism_core::{CacheRecord, CacheStore, Config, Fingerprint, VariantFormat};

/// Arguments for the `cache` command.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Subcommands for cache inspection.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print the cache record as JSON
    Show {
        /// 16-hex-character content fingerprint
        fingerprint: String,
    },

    /// Print a srcset attribute for one format
    Srcset {
        fingerprint: String,

        /// Variant format: avif, webp, jpeg or png
        #[arg(short, long, default_value = "webp", value_parser = parse_format)]
        format: VariantFormat,
    },

    /// Print the best variant URL for a display slot
    Best {
        fingerprint: String,

        /// Display width in CSS pixels
        #[arg(short, long)]
        width: u32,

        /// Device pixel ratio
        #[arg(long, default_value = "1.0")]
        dpr: f32,

        /// Preferred variant format
        #[arg(short, long, default_value = "avif", value_parser = parse_format)]
        format: VariantFormat,
    },
}

/// Execute the cache command.
pub async fn execute(args: CacheArgs, config: Config) -> anyhow::Result<()> {
    let cache = LocalCacheStore::new(config.store_root());

    match args.command {
        CacheCommand::Show { fingerprint } => {
            let record = load_record(&cache, &fingerprint).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        CacheCommand::Srcset {
            fingerprint,
            format,
        } => {
            let record = load_record(&cache, &fingerprint).await?;
            let srcset = record.srcset(format);
            if srcset.is_empty() {
                anyhow::bail!("No {} variants in record {}", format, fingerprint);
            }
            println!("{}", srcset);
        }

        CacheCommand::Best {
            fingerprint,
            width,
            dpr,
            format,
        } => {
            let record = load_record(&cache, &fingerprint).await?;
            match record.best_variant(width, dpr, format) {
                Some(url) => println!("{}", url),
                None => anyhow::bail!("Record {} has no variants", fingerprint),
            }
        }
    }

    Ok(())
}

async fn load_record(cache: &LocalCacheStore, fingerprint: &str) -> anyhow::Result<CacheRecord> {
    let Some(fp) = Fingerprint::from_hex(fingerprint) else {
        anyhow::bail!(
            "Invalid fingerprint: {:?}\n\n  Hint: Fingerprints are 16 lowercase hex characters.",
            fingerprint
        );
    };
    match cache.get(&fp).await? {
        Some(record) => Ok(record),
        None => anyhow::bail!(
            "No cache record for {}\n  Looked in: {}",
            fp,
            cache.record_path(&fp).display()
        ),
    }
}

fn parse_format(s: &str) -> Result<VariantFormat, String> {
    VariantFormat::parse(s).ok_or_else(|| format!("unknown variant format: {}", s))
}
