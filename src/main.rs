use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use fcn_records::{convert, inspect};

#[derive(Parser)]
#[command(
    name = "fcn-records",
    about = "Convert image / segmentation-mask pairs into TFRecord training files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Worker threads for decoding (default: one per core)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert the train/val splits of a VOC-style dataset into record files
    Convert(convert::ConvertArgs),

    /// Verify a record file and print a JSON summary of its contents
    Inspect(inspect::InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| anyhow!("rayon init failed: {}", e))?;
    }

    match cli.command {
        Command::Convert(args) => convert::run(args),
        Command::Inspect(args) => inspect::run(args),
    }
}
