//! Switch command implementations

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::SwitchCommand;
use crate::config::RuntimeContext;
use crate::output::{output_for_format, print_table};
use crate::store::StateStore;
use crate::switches::{on_off, SwitchKind, Switches};

#[derive(Debug, Tabled, Serialize)]
struct SwitchRow {
    switch: String,
    state: String,
    description: String,
}

fn rows(switches: &Switches) -> Vec<SwitchRow> {
    SwitchKind::ALL
        .into_iter()
        .map(|kind| SwitchRow {
            switch: kind.to_string(),
            state: on_off(switches.is_on(kind)).to_string(),
            description: kind.description().to_string(),
        })
        .collect()
}

pub fn run(ctx: &RuntimeContext, command: SwitchCommand) -> Result<()> {
    let (store, saved) = super::open_state()?;

    match command {
        SwitchCommand::List => list(ctx, &super::load_switches(ctx, &saved)),
        SwitchCommand::On { switch } => set(ctx, &store, switch, true),
        SwitchCommand::Off { switch } => set(ctx, &store, switch, false),
    }
}

fn list(ctx: &RuntimeContext, switches: &Switches) -> Result<()> {
    let rows = rows(switches);
    output_for_format(ctx, &rows, || print_table(ctx, &rows))
}

fn set(ctx: &RuntimeContext, store: &StateStore, kind: SwitchKind, on: bool) -> Result<()> {
    store.save_switch(kind, on)?;

    if !ctx.global.quiet {
        println!("Switch {kind} is now {}", on_off(on));
    }
    Ok(())
}
