#![cfg_attr(coverage, feature(coverage_attribute))]
mod wait;

use clap::{
    Parser,
    Subcommand,
    crate_version,
};
use kr_core::logging;
use kr_core::prelude::*;

#[derive(Parser)]
#[command(
    about = "command-line app for waiting on Kubernetes workloads to become ready",
    version,
    propagate_version = true
)]
struct KrCommandRoot {
    #[command(subcommand)]
    subcommand: KrSubcommand,

    #[arg(short, long, default_value = "warn", global = true)]
    verbosity: String,
}

#[derive(Subcommand)]
enum KrSubcommand {
    #[command(about = "wait for a set of resources to become ready", visible_alias = "w")]
    Wait(wait::Args),

    #[command(about = "krctl version")]
    Version,
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = KrCommandRoot::parse();
    logging::setup_for_cli(&args.verbosity);

    match &args.subcommand {
        KrSubcommand::Wait(args) => {
            let client = kube::Client::try_default().await?;
            wait::cmd(args, client).await
        },
        KrSubcommand::Version => {
            println!("krctl {}", crate_version!());
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests;
