//! gwcache CLI entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

#[cfg(test)]
mod handlers_tests;

use commands::{Commands, ConfigCommands};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "gwcache")]
#[command(author, version, about = "API Gateway response caching for serverless services", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Logs go to stderr so command output stays pipeable. `RUST_LOG` overrides
/// the default `info` level.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = CliConfig::load().unwrap_or_default();

    match cli.command {
        Commands::Plan {
            manifest,
            stage,
            region,
            stage_settings,
            format,
        } => handlers::plan(&config, &manifest, stage, region, stage_settings.as_deref(), format)?,
        Commands::Annotate {
            manifest,
            template,
            output,
        } => handlers::annotate(&manifest, &template, output.as_deref())?,
        Commands::Reconcile {
            manifest,
            stage,
            region,
            rest_api_id,
            deadline_secs,
        } => handlers::reconcile(&config, &manifest, stage, region, rest_api_id, deadline_secs).await?,
        Commands::Schema => handlers::schema()?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
            ConfigCommands::Set { key, value } => handlers::set_config(&key, &value)?,
        },
    }

    Ok(())
}
