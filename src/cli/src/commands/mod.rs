//! CLI command definitions and dispatch.

mod check;
mod extract;
mod reconcile;
mod version;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use layercheck_core::CheckConfig;
use layercheck_runtime::{FileLayer, OciImage};
use tokio_util::sync::CancellationToken;

/// Layercheck - container image layer certification checks.
#[derive(Parser)]
#[command(name = "layercheck", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Extract matching files from the image layers into a directory
    Extract(extract::ExtractArgs),
    /// Check that package-owned files were only changed by the package manager
    Reconcile(reconcile::ReconcileArgs),
    /// Extract platform markers, detect the distribution and reconcile
    Check(check::CheckArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Where the layers come from.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// OCI image layout directory
    pub image: Option<PathBuf>,

    /// Layer tarball (gzip or plain), appended after the image's layers; repeatable
    #[arg(long = "layer", value_name = "FILE")]
    pub layers: Vec<PathBuf>,

    /// YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ImageArgs {
    /// Open every layer in base-to-top order.
    pub(crate) fn load_layers(&self) -> Result<Vec<FileLayer>, Box<dyn std::error::Error>> {
        let mut layers = match &self.image {
            Some(path) => {
                let image = OciImage::from_path(path)?;
                tracing::info!(
                    image = %path.display(),
                    layers = image.layers().len(),
                    architecture = %image.config().architecture,
                    "Loaded OCI image"
                );
                image.into_layers()
            }
            None => Vec::new(),
        };
        for path in &self.layers {
            layers.push(FileLayer::from_path(path)?);
        }
        if layers.is_empty() {
            return Err("no layers given: pass an OCI image directory or --layer FILE".into());
        }
        Ok(layers)
    }

    pub(crate) fn load_config(&self) -> Result<CheckConfig, Box<dyn std::error::Error>> {
        match &self.config {
            Some(path) => Ok(CheckConfig::load(path)?),
            None => Ok(CheckConfig::default()),
        }
    }
}

/// Run blocking work that can be interrupted with Ctrl-C.
pub(crate) async fn run_cancellable<T, F>(work: F) -> Result<T, Box<dyn std::error::Error>>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> layercheck_core::Result<T> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        })
    };

    let result = tokio::task::spawn_blocking(move || work(cancel)).await;
    watcher.abort();
    Ok(result??)
}

/// Dispatch a parsed CLI to the appropriate command handler.
///
/// Returns the process exit code.
pub async fn dispatch(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Extract(args) => extract::execute(args).await,
        Command::Reconcile(args) => reconcile::execute(args).await,
        Command::Check(args) => check::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
