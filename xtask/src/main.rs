mod ci;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development task runner for script-executor")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run CI checks
    Ci(ci::CiArgs),
}

fn main() -> Result<()> {
    let args = Args::parse();

    smol::block_on(async {
        match args.cmd {
            Command::Ci(args) => ci::run(args).await,
        }
    })
}
