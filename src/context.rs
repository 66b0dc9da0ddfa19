//! Entity summary handed to the model as context

use std::fmt::Write;

use crate::host::{EntityRegistry, EntitySnapshot};

pub const ACCESS_DENIED: &str = "Access not allowed.";
pub const STATES_UNAVAILABLE: &str = "Entity states unavailable.";

/// Summarize every entity as `- <entity_id>: <state>` lines.
///
/// With `max_entities` set, only that many entities are listed; the header
/// still reports the full count.
pub fn summarize(states: &[EntitySnapshot], max_entities: Option<usize>) -> String {
    let mut summary = format!(
        "The Home Assistant instance has {} entities.",
        states.len()
    );

    let listed = max_entities.unwrap_or(states.len()).min(states.len());
    for entity in &states[..listed] {
        let _ = write!(summary, "\n- {}: {}", entity.entity_id, entity.state);
    }

    let hidden = states.len() - listed;
    if hidden > 0 {
        let _ = write!(summary, "\n- ... ({hidden} more not listed)");
    }

    summary
}

/// Build the context summary, querying the registry only when access is allowed
pub async fn build_summary(
    registry: &dyn EntityRegistry,
    access_allowed: bool,
    max_entities: Option<usize>,
) -> String {
    if !access_allowed {
        return ACCESS_DENIED.to_string();
    }

    log::debug!("Generating entities summary for Perplexity context");

    match registry.all_states().await {
        Ok(states) => summarize(&states, max_entities),
        Err(err) => {
            log::warn!("Could not read entity states for context: {err:#}");
            STATES_UNAVAILABLE.to_string()
        }
    }
}
