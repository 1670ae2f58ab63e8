//! Gauntlet - declarative test scenario runner
//!
//! Loads YAML scenarios and runs their actions in order with retries,
//! deadlines, fixtures and dependency checks.

use clap::Parser;
use gauntlet::commands::Commands;
use gauntlet::{cli, common::logging};

#[derive(Parser)]
#[command(name = "gauntlet", about = "Declarative test scenario runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    match cli::dispatch(cli.command, cli.verbose).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
