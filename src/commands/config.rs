//! `config` subcommands: inspect or reset the config file

use anyhow::Result;

use crate::cli::ConfigCommand;
use crate::config::{write_default_config, RuntimeContext};
use crate::output::print_output;

pub fn run(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show | ConfigCommand::Get { key: None } => {
            print_output(ctx, &ctx.config.redacted())
        }
        ConfigCommand::Get { key: Some(key) } => {
            println!("{}", ctx.config.display_value(&key)?);
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.config_path().display());
            Ok(())
        }
        ConfigCommand::Reset => {
            write_default_config(ctx.config_path())?;
            if !ctx.global.quiet {
                println!(
                    "Configuration reset to defaults at {}",
                    ctx.config_path().display()
                );
            }
            Ok(())
        }
    }
}
