//! `layercheck reconcile` command.

use clap::Args;
use layercheck_core::DistTag;

use super::{run_cancellable, ImageArgs};
use crate::output;

#[derive(Args)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Distribution tag expected in package releases (e.g. el9), or "unknown"
    #[arg(long)]
    pub dist_tag: Option<DistTag>,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ReconcileArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let layers = args.image.load_layers()?;
    let config = args.image.load_config()?.provenance;
    let dist_tag = args
        .dist_tag
        .or_else(|| config.dist_tag.as_deref().map(DistTag::from))
        .unwrap_or_default();

    let verdict = run_cancellable(move |cancel| {
        layercheck_runtime::reconcile(&layers, &dist_tag, &config, &cancel)
    })
    .await?;

    output::print_verdict(&verdict, args.json)?;
    Ok(if verdict.passed { 0 } else { 1 })
}
