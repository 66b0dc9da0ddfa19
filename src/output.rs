//! Output formatting utilities
//!
//! Handles JSON, YAML, and table output formats.

use std::io::IsTerminal;

use anyhow::Result;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::OutputFormat;
use crate::config::RuntimeContext;

/// Format and print data according to the configured output format
pub fn print_output<T: Serialize>(ctx: &RuntimeContext, data: &T) -> Result<()> {
    let output = format_output(ctx.output_format(), std::io::stdout().is_terminal(), data)?;
    println!("{output}");
    Ok(())
}

/// Format data for a machine-readable output format
pub fn format_output<T: Serialize>(format: OutputFormat, is_tty: bool, data: &T) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
        OutputFormat::Auto if !is_tty => Ok(serde_json::to_string(data)?),
        _ if is_tty => Ok(serde_json::to_string_pretty(data)?),
        _ => Ok(serde_json::to_string(data)?),
    }
}

/// Whether the human-readable rendering should be used
pub fn wants_human(format: OutputFormat, is_tty: bool) -> bool {
    match format {
        OutputFormat::Table => true,
        OutputFormat::Auto => is_tty,
        _ => false,
    }
}

/// Print `data` as JSON/YAML when requested, otherwise run `human`
pub fn output_for_format<T, F>(ctx: &RuntimeContext, data: &T, human: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> Result<()>,
{
    if wants_human(ctx.output_format(), std::io::stdout().is_terminal()) {
        human()
    } else {
        print_output(ctx, data)
    }
}

/// Print a table from items that implement Tabled
pub fn print_table<T: Tabled>(ctx: &RuntimeContext, items: &[T]) -> Result<()> {
    let mut table = Table::new(items);
    table.with(Style::sharp());

    if ctx.global.no_headers || ctx.config.output.no_headers {
        table.with(tabled::settings::Remove::row(
            tabled::settings::object::Rows::first(),
        ));
    }

    println!("{table}");
    Ok(())
}
