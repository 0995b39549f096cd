//! Vessel CLI entry point.

use clap::Parser;

use vessel::cli::{handle_error, load_config, Cli, Commands};
use vessel::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = cli.log_level_override() {
        log_config = log_config.with_level(level);
    }
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Chat(args) => vessel::cli::commands::chat::execute(args, &config, cli.json).await,
        Commands::Pods(command) => {
            vessel::cli::commands::pods::execute(command, &config, cli.json).await
        }
        Commands::Rhythm(args) => vessel::cli::commands::rhythm::execute(args, &config, cli.json),
        Commands::Scratch(command) => {
            vessel::cli::commands::scratch::execute(command, &config, cli.json)
        }
        Commands::Config(command) => {
            vessel::cli::commands::config::execute(command, &config, cli.json)
        }
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
