//! Info command implementation

use anyhow::Result;
use serde::Serialize;

use crate::agent::ATTRIBUTION;
use crate::config::{Language, Model, RuntimeContext};
use crate::output::output_for_format;

#[derive(Debug, Serialize)]
struct AgentInfo {
    attribution: &'static str,
    model: Model,
    language: Language,
    endpoint: String,
    timeout_secs: u64,
    notify_response: bool,
    homeassistant: Option<String>,
    supported_models: Vec<Model>,
    supported_languages: Vec<Language>,
}

pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let info = AgentInfo {
        attribution: ATTRIBUTION,
        model: ctx.model(),
        language: ctx.language(),
        endpoint: ctx.config.perplexity.endpoint.clone(),
        timeout_secs: ctx.completion_timeout(),
        notify_response: ctx.config.perplexity.notify_response,
        homeassistant: ctx.server_url().ok().map(str::to_string),
        supported_models: Model::ALL.to_vec(),
        supported_languages: Language::ALL.to_vec(),
    };

    output_for_format(ctx, &info, || {
        println!("Perplexity Assistant ({})", info.attribution);
        println!("==========================");
        println!("Model:          {}", info.model);
        println!("Language:       {}", info.language);
        println!("Endpoint:       {}", info.endpoint);
        println!("Timeout:        {} s", info.timeout_secs);
        println!("Notify:         {}", info.notify_response);
        println!(
            "Home Assistant: {}",
            info.homeassistant.as_deref().unwrap_or("(not configured)")
        );
        println!();
        println!("Models:    {}", join(&info.supported_models));
        println!("Languages: {}", join(&info.supported_languages));
        Ok(())
    })
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
