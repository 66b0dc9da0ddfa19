//! Ask command - run one prompt through the Perplexity agent

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::agent::{blank_prompt_reply, ActionOutcome, Agent, ConversationResult};
use crate::api::HassClient;
use crate::cli::AskCommand;
use crate::config::RuntimeContext;
use crate::output::output_for_format;

/// How long a pending notification may delay exit
const BACKGROUND_GRACE: Duration = Duration::from_secs(5);

pub async fn run(ctx: &RuntimeContext, cmd: AskCommand) -> Result<()> {
    let prompt = cmd.words.join(" ");

    let result = match blank_prompt_reply(&prompt, ctx.language()) {
        Some(reply) => reply,
        None => answer(ctx, &prompt).await?,
    };

    print_result(ctx, &result)
}

async fn answer(ctx: &RuntimeContext, prompt: &str) -> Result<ConversationResult> {
    let settings = ctx.agent_settings()?;

    let (store, saved) = super::open_state()?;
    let switches = Arc::new(super::load_switches(ctx, &saved));
    let costs = Arc::new(super::load_costs(&saved, &store));
    let host = Arc::new(HassClient::new(ctx)?);

    log::debug!(
        "Asking {} (lang={}): '{}'",
        settings.model,
        settings.language,
        prompt
    );

    let agent = Agent::new(settings, host, switches, costs)?;

    let result = tokio::select! {
        result = agent.ask(prompt) => result,
        _ = tokio::signal::ctrl_c() => {
            bail!("Interrupted before Perplexity answered");
        }
    };

    agent.drain_background(BACKGROUND_GRACE).await;
    Ok(result)
}

fn print_result(ctx: &RuntimeContext, result: &ConversationResult) -> Result<()> {
    output_for_format(ctx, result, || {
        println!("{}", result.speech);

        if !ctx.global.quiet {
            for action in &result.actions {
                match &action.outcome {
                    ActionOutcome::Dispatched { action, target } => {
                        eprintln!("Called {action} on {target}");
                    }
                    ActionOutcome::Failed {
                        action,
                        target,
                        error,
                    } => {
                        eprintln!("Failed to call {action} on {target}: {error}");
                    }
                    ActionOutcome::Rejected { reason } => {
                        eprintln!("Skipped '{}': {reason}", action.directive);
                    }
                }
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    #[tokio::test]
    async fn test_blank_prompt_needs_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        let cli = Cli::try_parse_from([
            "pplx-assist",
            "--config",
            config.to_str().unwrap(),
            "--api-key",
            "not-a-key",
            "ask",
            "   ",
        ])
        .unwrap();
        let ctx = RuntimeContext::new(&cli.global).unwrap();
        assert!(ctx.agent_settings().is_err());

        let Command::Ask(cmd) = cli.command else {
            panic!("expected ask");
        };
        run(&ctx, cmd).await.unwrap();
    }
}
