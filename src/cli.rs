//! CLI argument parsing and command definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::config::{Language, Model};
use crate::switches::SwitchKind;

/// A Perplexity-powered conversation agent for Home Assistant
#[derive(Debug, Parser)]
#[command(
    name = "pplx-assist",
    author,
    version,
    about = "A Perplexity-powered conversation agent for Home Assistant",
    propagate_version = true,
    after_help = "Use 'pplx-assist <command> --help' for more information about a command."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,
    #[command(subcommand)]
    pub command: Command,
}

/// Global options available to all commands
#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
    /// Output format (json, yaml, table, auto)
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        global = true,
        conflicts_with = "json"
    )]
    pub output_format: Option<OutputFormat>,

    /// Output as JSON (shorthand for -o json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Home Assistant server URL
    #[arg(short = 's', long, env = "HASS_SERVER", global = true)]
    pub server: Option<String>,

    /// Home Assistant authentication token
    #[arg(long, env = "HASS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Perplexity API key (pplx-...)
    #[arg(long, env = "PPLX_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Perplexity model to query
    #[arg(short = 'm', long, value_enum, global = true)]
    pub model: Option<Model>,

    /// Language of the conversation
    #[arg(short = 'l', long, value_enum, global = true)]
    pub language: Option<Language>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Skip SSL certificate verification for Home Assistant
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Override config file path
    #[arg(long, value_name = "PATH", env = "PPLX_ASSIST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Reduce output to only errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase logging verbosity (stackable: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Enable trace logging
    #[arg(long, global = true)]
    pub trace: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Hide table headers
    #[arg(long, global = true)]
    pub no_headers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[non_exhaustive]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Auto,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask Perplexity a question, optionally acting on entities
    Ask(AskCommand),

    /// Inspect and flip the assistant's feature switches
    Switch {
        #[command(subcommand)]
        command: SwitchCommand,
    },

    /// Show accumulated Perplexity usage cost
    Cost {
        #[command(subcommand)]
        command: CostCommand,
    },

    /// Display agent information
    Info,

    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct AskCommand {
    /// The prompt (e.g., "turn off the kitchen light")
    #[arg(trailing_var_arg = true, value_name = "PROMPT")]
    pub words: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum SwitchCommand {
    /// List all switches and their state
    List,

    /// Turn a switch on
    On {
        #[arg(value_enum)]
        switch: SwitchKind,
    },

    /// Turn a switch off
    Off {
        #[arg(value_enum)]
        switch: SwitchKind,
    },
}

#[derive(Debug, Subcommand)]
pub enum CostCommand {
    /// Show monthly and all-time cost
    Show,

    /// Start the monthly cost over from zero
    Reset,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show effective configuration
    Show,

    /// Print config file path
    Path,

    /// Get a specific configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: Option<String>,
    },

    /// Reset configuration to defaults
    Reset,
}
