mod cli;
mod output;
mod subcommands;

use clap::Parser;
use cli::Cli;
use output::OutputFormatter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    if let Err(e) = subcommands::run(&cli).await {
        OutputFormatter::new().error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}
