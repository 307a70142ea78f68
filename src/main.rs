use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gridagg::cli::{Cli, Commands};
use gridagg::commands::{aggregate, convert, rollup};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(cli.verbose > 1)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Aggregate(args) => aggregate::run(&cli, args),
        Commands::Convert(args) => convert::run(&cli, args),
        Commands::Rollup(args) => rollup::run(&cli, args),
    }
}
