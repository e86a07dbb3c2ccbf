//! `layercheck check` command.

use clap::Args;
use layercheck_core::DistTag;
use layercheck_runtime::OsRelease;

use super::{run_cancellable, ImageArgs};
use crate::output;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Override the distribution tag detected from os-release
    #[arg(long)]
    pub dist_tag: Option<DistTag>,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: CheckArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let layers = args.image.load_layers()?;
    let config = args.image.load_config()?;
    let override_tag = args
        .dist_tag
        .or_else(|| config.provenance.dist_tag.as_deref().map(DistTag::from));

    let verdict = run_cancellable(move |cancel| {
        let staging = tempfile::TempDir::new()?;
        let report = layercheck_runtime::extract(
            staging.path(),
            &layers,
            &config.extract.patterns,
            &cancel,
        )?;
        tracing::info!(
            files = report.extracted.len(),
            passes = report.passes,
            "Extracted image subset"
        );

        let dist_tag = match override_tag {
            Some(tag) => tag,
            None => OsRelease::load(staging.path())?
                .map(|release| release.dist_tag())
                .unwrap_or_default(),
        };
        tracing::info!(%dist_tag, "Reconciling packages");

        layercheck_runtime::reconcile(&layers, &dist_tag, &config.provenance, &cancel)
    })
    .await?;

    output::print_verdict(&verdict, args.json)?;
    Ok(if verdict.passed { 0 } else { 1 })
}
