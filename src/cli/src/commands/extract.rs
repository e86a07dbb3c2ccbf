//! `layercheck extract` command.

use std::path::PathBuf;

use clap::Args;

use super::{run_cancellable, ImageArgs};

#[derive(Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Destination directory (must exist)
    #[arg(long)]
    pub dest: PathBuf,

    /// Glob pattern of paths to extract; repeatable (defaults to the configured patterns)
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,
}

pub async fn execute(args: ExtractArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let layers = args.image.load_layers()?;
    let patterns = if args.patterns.is_empty() {
        args.image.load_config()?.extract.patterns
    } else {
        args.patterns
    };
    let dest = args.dest;

    let report = run_cancellable(move |cancel| {
        layercheck_runtime::extract(&dest, &layers, &patterns, &cancel)
    })
    .await?;

    for path in &report.extracted {
        println!("{path}");
    }
    eprintln!(
        "Extracted {} file(s) in {} pass(es)",
        report.extracted.len(),
        report.passes
    );
    for path in &report.dangling {
        eprintln!("warning: link target not found in any layer: /{path}");
    }
    for path in &report.skipped_links {
        eprintln!("warning: skipped link pointing outside the image: /{path}");
    }
    Ok(0)
}
