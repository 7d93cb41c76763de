//! Radcoupler CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use radcoupler::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => radcoupler::cli::commands::run::execute(args, cli.json).await,
        Commands::Check(args) => radcoupler::cli::commands::check::execute(args, cli.json)
            .await
            .map(|()| ExitCode::SUCCESS),
    };

    result.unwrap_or_else(|err| radcoupler::cli::handle_error(err, cli.json))
}
