// Recording sync entry point: one invocation per process

use anyhow::{Context, Result};
use clap::Parser;
use common::bootstrap;
use common::config::Settings;
use common::models::SyncRequest;
use common::telemetry;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

/// Copy pending call recordings into object storage
#[derive(Debug, Parser)]
#[command(name = "recording-sync", version)]
struct Args {
    /// Invocation request JSON file, `-` for stdin
    #[arg(long, default_value = "-")]
    request: String,

    /// Directory holding default.toml / local.toml
    #[arg(long, env = "RECORDING_SYNC_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,
}

async fn read_request(source: &str) -> Result<SyncRequest> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read request file '{}'", source))?
    };

    serde_json::from_str(&raw).context("Request is not a valid sync request")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load_from_path(&args.config_dir)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    bootstrap::init_observability(&settings)?;

    info!("Starting recording sync worker");

    let request = read_request(&args.request).await.map_err(|e| {
        error!(error = %e, "Failed to load request");
        e
    })?;

    let job = bootstrap::build_sync_job(&settings).await?;
    let result = job.run(request).await;

    telemetry::shutdown_tracer();

    let response = result.context("Recording sync failed")?;
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", rendered);

    info!("Recording sync finished");
    Ok(())
}
