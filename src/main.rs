//! pplx-assist - A Perplexity-powered conversation agent for Home Assistant
//!
//! Sends prompts to the Perplexity chat completion API with live entity
//! context and executes the device actions the model asks for.

mod agent;
mod api;
mod cli;
mod commands;
mod completion;
mod config;
mod context;
mod cost;
mod directive;
mod host;
mod output;
mod prompt;
mod store;
mod switches;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::RuntimeContext;

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(io::stderr(), "Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = RuntimeContext::new(&cli.global)?;
    ctx.init_logging()?;

    log::debug!("Config loaded from: {:?}", ctx.config_path());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_command(&ctx, cli.command))
}

async fn run_command(ctx: &RuntimeContext, command: Command) -> Result<()> {
    match command {
        Command::Ask(cmd) => commands::ask::run(ctx, cmd).await,
        Command::Switch { command } => commands::switch::run(ctx, command),
        Command::Cost { command } => commands::cost::run(ctx, command),
        Command::Info => commands::info::run(ctx),
        Command::Config { command } => commands::config::run(ctx, command),
        Command::Completions { shell } => commands::completions::run(shell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_collects_prompt_words() {
        let cli = Cli::try_parse_from(["pplx-assist", "ask", "turn", "off", "the", "light"])
            .unwrap();
        match cli.command {
            Command::Ask(cmd) => assert_eq!(cmd.words.join(" "), "turn off the light"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_switch_names_are_kebab_case() {
        let cli = Cli::try_parse_from(["pplx-assist", "switch", "on", "entity-actions"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Switch {
                command: cli::SwitchCommand::On {
                    switch: switches::SwitchKind::EntityActions
                }
            }
        ));
    }

    #[test]
    fn test_model_flag_accepts_api_names() {
        let cli = Cli::try_parse_from(["pplx-assist", "--model", "gpt-3.5-turbo", "info"]).unwrap();
        assert_eq!(cli.global.model, Some(config::Model::Gpt35Turbo));
    }
}
