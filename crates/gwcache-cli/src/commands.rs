//! CLI command definitions.

use crate::config::OutputFormat;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Print the stage patch operations a reconcile would apply
    Plan {
        /// Path to the service manifest
        #[arg(short, long, default_value = "serverless.yml")]
        manifest: PathBuf,

        /// Stage name (overrides the manifest)
        #[arg(short, long)]
        stage: Option<String>,

        /// Region (overrides the manifest)
        #[arg(short, long)]
        region: Option<String>,

        /// JSON file holding the current stage, as returned by getStage
        #[arg(long)]
        stage_settings: Option<PathBuf>,

        /// Output format (defaults to the configured one)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Wire cache key parameters into a compiled template
    Annotate {
        /// Path to the service manifest
        #[arg(short, long, default_value = "serverless.yml")]
        manifest: PathBuf,

        /// Compiled template (JSON)
        #[arg(short, long)]
        template: PathBuf,

        /// Where to write the result; defaults to the template itself
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply caching settings to the deployed stage
    Reconcile {
        /// Path to the service manifest
        #[arg(short, long, default_value = "serverless.yml")]
        manifest: PathBuf,

        /// Stage name (overrides the manifest)
        #[arg(short, long)]
        stage: Option<String>,

        /// Region (overrides the manifest)
        #[arg(short, long)]
        region: Option<String>,

        /// REST API id; skips discovery through the deployed stack
        #[arg(long)]
        rest_api_id: Option<String>,

        /// Give up applying after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Print the JSON schema of the service manifest
    Schema,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,
    },
}
