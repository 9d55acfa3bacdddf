//! eAlbum CLI: upload an album described by a JSON manifest.
//!
//! Set EALBUM_API_TOKEN (or JWT_TOKEN) and EALBUM_API_URL (or API_URL). Uses Bearer auth.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ealbum_api_client::credentials_from_config;
use ealbum_cli::{init_tracing, CliObserver, Manifest};
use ealbum_core::{ErrorMetadata, TransportMode, UploaderConfig};
use ealbum_upload::UploadOrchestrator;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ealbum", about = "eAlbum upload CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every file of a manifest and create the album
    Upload {
        /// Path to the album manifest (JSON)
        manifest: PathBuf,
        /// Transport: direct, form, chunked or auto
        #[arg(long)]
        transport: Option<String>,
        /// Files per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Print the batch plan of a manifest without uploading
    Plan {
        /// Path to the album manifest (JSON)
        manifest: PathBuf,
        /// Files per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[derive(Serialize)]
struct UploadSummary {
    name: String,
    code: String,
    session_id: String,
    images: usize,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn batch_size(value: usize) -> anyhow::Result<NonZeroUsize> {
    NonZeroUsize::new(value).context("Batch size must be greater than 0")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = UploaderConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Plan {
            manifest,
            batch_size: size,
        } => {
            let manifest = Manifest::load(&manifest)?;
            let plan = manifest.plan(batch_size(size.unwrap_or(config.batch_size))?);
            print_json(&plan)?;
        }
        Commands::Upload {
            manifest,
            transport,
            batch_size: size,
        } => {
            if let Some(transport) = transport {
                config.transport = transport.parse::<TransportMode>()?;
            }
            if let Some(size) = size {
                config.batch_size = size;
            }
            config.validate()?;
            if config.api_token.is_none() {
                anyhow::bail!("Set EALBUM_API_TOKEN (or JWT_TOKEN) to upload");
            }

            let manifest = Manifest::load(&manifest)?;
            tracing::info!(
                files = manifest.file_count(),
                categories = manifest.categories.len(),
                transport = %config.transport,
                batch_size = config.batch_size,
                "Manifest loaded"
            );
            let mut draft = manifest.into_draft()?;

            let orchestrator = UploadOrchestrator::from_config(&config, credentials_from_config(&config))
                .context("Failed to create uploader")?
                .with_observer(Arc::new(CliObserver::new()));

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, cancelling upload");
                    interrupt.cancel();
                }
            });

            let mut session = orchestrator.start_session();
            match orchestrator
                .run_with_cancel(&mut session, &mut draft, &cancel)
                .await
            {
                Ok(album) => {
                    print_json(&UploadSummary {
                        name: album.name,
                        code: album.code,
                        session_id: session.id().to_string(),
                        images: session.snapshot().files_processed,
                    })?;
                }
                Err(err) => {
                    for object in session.orphaned() {
                        tracing::warn!(
                            file = %object.file_name,
                            key = %object.key,
                            "Uploaded object was not registered"
                        );
                    }
                    anyhow::bail!("[{}] {}", err.stage(), err.client_message());
                }
            }
        }
    }

    Ok(())
}
