use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod models;
mod services;

use config::{StorageBackend, SyncConfig};
use services::{
    local_store::LocalObjectStore, locator_service::AssetLocator,
    provisioner_service::BucketProvisioner, s3_store::S3Storage, storage_service::ObjectStorage,
    upload_service::UploadOrchestrator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config ---
    let cfg = SyncConfig::from_env_and_args()?;
    tracing::info!("Starting asset sync with config: {:?}", cfg);

    // --- Stop between files on Ctrl-C ---
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current file");
            on_signal.cancel();
        }
    });

    // --- Connect the storage backend ---
    match &cfg.backend {
        StorageBackend::S3 {
            endpoint_url,
            force_path_style,
        } => {
            let storage = S3Storage::connect(
                cfg.credentials.as_ref(),
                &cfg.region,
                endpoint_url.as_deref(),
                *force_path_style,
            )
            .await;
            run(&storage, &cfg, cancel).await
        }
        StorageBackend::Local {
            storage_dir,
            database_url,
        } => {
            let storage = LocalObjectStore::open(storage_dir, database_url)
                .await
                .with_context(|| format!("opening local store at {}", storage_dir))?;
            run(&storage, &cfg, cancel).await
        }
    }
}

/// Provision the bucket, locate the assets, push them.
async fn run<S: ObjectStorage>(storage: &S, cfg: &SyncConfig, cancel: CancellationToken) -> Result<()> {
    let bucket = BucketProvisioner::new(storage).ensure_bucket(cfg).await?;

    let files = AssetLocator::from_config(cfg).locate(&cfg.upload_globs)?;
    tracing::info!("Located {} files under {}", files.len(), cfg.asset_root.display());

    let summary = UploadOrchestrator::new(storage)
        .with_cancellation(cancel)
        .sync(&bucket, &files, cfg)
        .await?;

    if cfg.json_summary {
        println!("{}", serde_json::to_string(&summary)?);
    }

    Ok(())
}
