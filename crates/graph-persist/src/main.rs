use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graph_persist_config::PersisterSettings;
use graph_persist_core::{BincodeCodec, GraphImage};

/// Inspect files written by graph-persist.
#[derive(Parser, Debug)]
#[command(name = "graph-persist", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump a saved object graph without knowing its record types.
    Inspect {
        /// Snapshot file to read.
        file: PathBuf,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,

        /// Print one line per node instead of the full image.
        #[arg(long, conflicts_with = "pretty")]
        summary: bool,
    },
    /// Validate a persister settings file and print it normalized.
    Settings {
        /// JSON settings file to read.
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let output = match cli.command {
        Command::Inspect {
            file,
            pretty,
            summary,
        } => {
            let image = read_image(&file)?;
            tracing::info!("Read {} node(s) from {}", image.nodes.len(), file.display());
            if summary {
                summarize(&image)
            } else {
                image_json(&image, pretty)?
            }
        }
        Command::Settings { file } => settings_json(&file)?,
    };

    println!("{output}");
    Ok(())
}

fn read_image(path: &Path) -> Result<GraphImage> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    BincodeCodec::read_image(&mut BufReader::new(file))
        .with_context(|| format!("failed to decode {}", path.display()))
}

fn image_json(image: &GraphImage, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(image)?
    } else {
        serde_json::to_string(image)?
    };
    Ok(json)
}

fn summarize(image: &GraphImage) -> String {
    let mut out = format!(
        "format v{}, {} node(s), root #{}",
        image.version,
        image.nodes.len(),
        image.root
    );
    for (id, node) in image.nodes.iter().enumerate() {
        let _ = write!(
            out,
            "\n#{id} {} ({} field(s))",
            node.type_name,
            node.fields.len()
        );
    }
    out
}

fn settings_json(path: &Path) -> Result<String> {
    let settings = PersisterSettings::from_json_file(path)
        .with_context(|| format!("invalid settings file {}", path.display()))?;
    if settings.active_auto_save().is_some() {
        tracing::info!("Auto-save is enabled");
    }
    Ok(serde_json::to_string_pretty(&settings)?)
}
