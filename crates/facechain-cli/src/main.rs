use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facechain::session::{envelope_from_file, extract_attachments, parse_result};
use facechain::{Bearing, ImageLoader, ImageSource, Settings};
use futures::TryStreamExt;

#[derive(Parser)]
#[command(name = "facechain", about = "facechain pipeline diagnostics")]
struct Cli {
    /// Settings file (TOML). Defaults to FACECHAIN_* environment variables.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an image and report its upright size and corrected orientation
    Probe {
        /// Local path, file:// URL or http(s) URL
        source: String,
    },
    /// List the captured faces in a session result envelope
    Session {
        /// JSON envelope file
        envelope: PathBuf,
        /// Only faces with this bearing (e.g. "straight", "left-up")
        #[arg(short, long)]
        bearing: Option<Bearing>,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::from_env());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    Settings::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Probe { source } => {
            let source: ImageSource = source.parse()?;
            let loader = ImageLoader::new(settings.http_timeout(), &settings.user_agent)?;
            let image = loader
                .to_domain_image(&source)
                .await
                .with_context(|| format!("loading {source}"))?;
            tracing::info!(%source, "probe complete");
            let report = serde_json::json!({
                "source": source.to_string(),
                "width": image.width(),
                "height": image.height(),
                "orientation": image.corrected(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Session { envelope, bearing } => {
            let raw = envelope_from_file(&envelope).await?;
            let result = parse_result(Some(&raw))?;
            let captured: Vec<_> = extract_attachments(&result, bearing).try_collect().await?;
            tracing::info!(
                attachments = result.attachments.len(),
                selected = captured.len(),
                "session inspected"
            );
            println!("{}", serde_json::to_string_pretty(&captured)?);
        }
    }

    Ok(())
}
