//! Cost command implementations

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::CostCommand;
use crate::config::RuntimeContext;
use crate::cost::{rounded, CostSnapshot};
use crate::output::{output_for_format, print_table};

#[derive(Debug, Tabled, Serialize)]
struct CostRow {
    counter: &'static str,
    #[tabled(rename = "cost ($)")]
    cost: f64,
    since: String,
}

fn rows(snapshot: &CostSnapshot) -> Vec<CostRow> {
    vec![
        CostRow {
            counter: "monthly",
            cost: rounded(snapshot.monthly),
            since: snapshot.month.to_string(),
        },
        CostRow {
            counter: "all-time",
            cost: rounded(snapshot.all_time),
            since: "-".to_string(),
        },
    ]
}

pub fn run(ctx: &RuntimeContext, command: CostCommand) -> Result<()> {
    let (store, saved) = super::open_state()?;
    let costs = super::load_costs(&saved, &store);

    match command {
        CostCommand::Show => show(ctx, &costs.snapshot()),
        CostCommand::Reset => {
            let snapshot = costs.reset_monthly();
            if !ctx.global.quiet {
                println!("Monthly cost reset for {}", snapshot.month);
            }
            Ok(())
        }
    }
}

fn show(ctx: &RuntimeContext, snapshot: &CostSnapshot) -> Result<()> {
    output_for_format(ctx, snapshot, || print_table(ctx, &rows(snapshot)))
}
