//! `layercheck version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<i32, Box<dyn std::error::Error>> {
    println!("layercheck version {}", layercheck_core::VERSION);
    println!("runtime version {}", layercheck_runtime::VERSION);
    Ok(0)
}
