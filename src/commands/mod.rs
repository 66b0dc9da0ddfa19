//! Command implementations

pub mod ask;
pub mod completions;
pub mod config;
pub mod cost;
pub mod info;
pub mod switch;

use std::sync::Arc;

use anyhow::Result;

use crate::config::RuntimeContext;
use crate::cost::{BillingMonth, CostAccumulator, CostSnapshot};
use crate::store::{PersistedState, StateStore};
use crate::switches::Switches;

/// Switches at their configured defaults, then restored from saved state
fn load_switches(ctx: &RuntimeContext, saved: &PersistedState) -> Switches {
    let switches = Switches::from_config(&ctx.config.perplexity);
    switches.restore(&saved.switches);
    switches
}

/// Counters from saved state, writing every change back through the store
fn load_costs(saved: &PersistedState, store: &Arc<StateStore>) -> CostAccumulator {
    let snapshot = saved
        .costs
        .unwrap_or_else(|| CostSnapshot::zero(BillingMonth::current()));
    CostAccumulator::restore(snapshot).with_ledger(store.clone())
}

/// Open the default state file and read it once
fn open_state() -> Result<(Arc<StateStore>, PersistedState)> {
    let store = Arc::new(StateStore::open_default()?);
    let saved = store.load()?;
    Ok((store, saved))
}
