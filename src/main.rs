use clap::Parser;
use prompt_tuner::cli::Cli;
use prompt_tuner::commands;
use prompt_tuner::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;

    commands::run(cli.command(), settings).await
}
