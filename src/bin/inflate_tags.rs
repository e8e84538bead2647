//! Expand a condensed metadata table (tag indices) into the distributable
//! form (tag names, prefixed ids).
//!
//! Missing inputs or a missing tag column abort before anything is written.
//! Bad rows are reported and dropped.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};

use result_enricher::error::ConfigError;
use result_enricher::metadata::decompress::compress;
use result_enricher::table::expand::{CondensedRecordExpander, ExpandOptions};
use result_enricher::tags::{TagCodec, TagDictionary};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Condensed table with a header row and a "tags"/"t" column
    #[arg(short, long, default_value = "metadata-condensed.csv")]
    input: PathBuf,

    /// Tag dictionary (JSON array of names)
    #[arg(short, long, default_value = "tags.json")]
    tags: PathBuf,

    /// Where to write the expanded table
    #[arg(short, long, default_value = "metadata-inflated.csv")]
    output: PathBuf,

    /// Prefix added to every row id
    #[arg(long, default_value = "EFTA")]
    id_prefix: String,

    /// Omit the header row (the packaged runtime table has none)
    #[arg(long)]
    no_header: bool,

    /// Gzip the output, producing the packaged metadata resource
    #[arg(long)]
    gzip: bool,
}

fn require_file(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingInput(path.display().to_string()))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    require_file(&args.input)?;
    require_file(&args.tags)?;

    let dictionary = TagDictionary::from_path(&args.tags)?;
    info!(tags = dictionary.len(), "Tag dictionary loaded");
    let codec = TagCodec::new(dictionary);

    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let options = ExpandOptions {
        id_prefix: args.id_prefix.clone(),
        include_header: !args.no_header,
    };
    let summary = CondensedRecordExpander::new(&codec, options).expand(&input)?;

    let bytes = if args.gzip {
        compress(&summary.output).context("Failed to compress output")?
    } else {
        summary.output.into_bytes()
    };
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(output = %args.output.display(), size = bytes.len(), "Expanded table written");
    info!(processed = summary.processed, "Processed rows");
    if summary.errored > 0 {
        warn!(errored = summary.errored, "Rows dropped");
    }
    if summary.invalid_tags > 0 {
        warn!(invalid_tags = summary.invalid_tags, "Invalid tag indices replaced");
    }

    Ok(())
}
