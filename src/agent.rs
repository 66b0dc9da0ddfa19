//! Conversation agent backed by the Perplexity API
//!
//! One prompt runs the whole pipeline: entity summary, payload, completion,
//! cost accounting, optional notification and directive dispatch. Every
//! failure ends in a spoken sentence; nothing is propagated to the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::completion::{CompletionClient, CompletionError};
use crate::config::{Language, Model};
use crate::context;
use crate::cost::CostAccumulator;
use crate::directive;
use crate::host::{ActionDispatcher, EntityRegistry, NotificationSink};
use crate::prompt;
use crate::switches::{SwitchKind, Switches};

pub const ATTRIBUTION: &str = "Created by Pekul & Powered by Perplexity AI";
pub const NOTIFICATION_TITLE: &str = "Perplexity Assistant";

const NO_PROMPT: &str = "No prompt provided.";
const SERVICE_ERROR: &str = "Error communicating with the Perplexity AI service.";

/// Everything the agent is configured with for its lifetime
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub api_key: String,
    pub model: Model,
    pub language: Language,
    pub notify_response: bool,
    pub custom_system_prompt: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub max_context_entities: Option<usize>,
}

/// What happened to one directive found in the reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Dispatched { action: String, target: String },
    Failed {
        action: String,
        target: String,
        error: String,
    },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    /// Directive text as written by the model
    pub directive: String,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

/// Spoken answer plus what the agent did to produce it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationResult {
    pub language: Language,
    pub speech: String,
    /// Usage cost added to the counters, if the call succeeded
    pub cost: Option<f64>,
    pub actions: Vec<ActionReport>,
}

impl ConversationResult {
    /// Speech only, nothing spent or dispatched
    pub fn spoken(language: Language, speech: impl Into<String>) -> Self {
        Self {
            language,
            speech: speech.into(),
            cost: None,
            actions: Vec::new(),
        }
    }
}

/// The reply for a prompt with nothing to ask, if `prompt` is blank
pub fn blank_prompt_reply(prompt: &str, language: Language) -> Option<ConversationResult> {
    prompt
        .trim()
        .is_empty()
        .then(|| ConversationResult::spoken(language, NO_PROMPT))
}

pub struct Agent {
    settings: AgentSettings,
    completions: CompletionClient,
    registry: Arc<dyn EntityRegistry>,
    dispatcher: Arc<dyn ActionDispatcher>,
    notifier: Arc<dyn NotificationSink>,
    switches: Arc<Switches>,
    costs: Arc<CostAccumulator>,
    background: Mutex<JoinSet<()>>,
}

impl Agent {
    pub fn new<H>(
        settings: AgentSettings,
        host: Arc<H>,
        switches: Arc<Switches>,
        costs: Arc<CostAccumulator>,
    ) -> Result<Self>
    where
        H: EntityRegistry + ActionDispatcher + NotificationSink + 'static,
    {
        let completions =
            CompletionClient::new(&settings.endpoint, &settings.api_key, settings.timeout)?;

        Ok(Self {
            settings,
            completions,
            registry: host.clone(),
            dispatcher: host.clone(),
            notifier: host,
            switches,
            costs,
            background: Mutex::new(JoinSet::new()),
        })
    }

    /// Answer a prompt received from the user
    pub async fn ask(&self, prompt: &str) -> ConversationResult {
        if let Some(reply) = blank_prompt_reply(prompt, self.settings.language) {
            return reply;
        }

        self.process(prompt.trim()).await
    }

    async fn process(&self, prompt: &str) -> ConversationResult {
        let access_allowed = self.switches.is_on(SwitchKind::EntityAccess);
        let actions_allowed = self.switches.is_on(SwitchKind::EntityActions);

        let summary = context::build_summary(
            self.registry.as_ref(),
            access_allowed,
            self.settings.max_context_entities,
        )
        .await;

        let request = prompt::build_request(
            self.settings.model,
            self.settings.language,
            &self.settings.custom_system_prompt,
            &summary,
            prompt,
        );

        let completion = match self.completions.complete(&request).await {
            Ok(completion) => completion,
            Err(err) => {
                return ConversationResult::spoken(self.settings.language, failure_speech(err))
            }
        };

        log::debug!(
            "Perplexity API has responded successfully (cost={}). Response: {}",
            completion.cost,
            completion.content
        );

        self.costs.increment(completion.cost);

        if self.settings.notify_response {
            self.notify_detached(completion.content.clone());
        }

        let actions = if !directive::contains_directive(&completion.content) {
            Vec::new()
        } else if actions_allowed {
            self.run_directives(&completion.content).await
        } else {
            log::debug!("Reply contains ACTION directives but entity actions are off");
            Vec::new()
        };

        ConversationResult {
            language: self.settings.language,
            speech: completion.content,
            cost: Some(completion.cost),
            actions,
        }
    }

    /// Dispatch every directive in order; one failure does not stop the rest
    async fn run_directives(&self, content: &str) -> Vec<ActionReport> {
        let mut reports = Vec::new();

        for candidate in directive::scan(content) {
            let outcome = match candidate.parsed {
                Err(err) => {
                    log::warn!("Invalid ACTION format in response: {} ({err})", candidate.raw);
                    ActionOutcome::Rejected {
                        reason: err.to_string(),
                    }
                }
                Ok(action) => {
                    let result = self
                        .dispatcher
                        .dispatch(&action.domain, &action.service, &action.target)
                        .await;

                    match result {
                        Ok(()) => {
                            log::info!("Called {} on {}", action.action(), action.target);
                            ActionOutcome::Dispatched {
                                action: action.action(),
                                target: action.target,
                            }
                        }
                        Err(err) => {
                            log::warn!(
                                "Calling {} on {} failed: {err:#}",
                                action.action(),
                                action.target
                            );
                            ActionOutcome::Failed {
                                action: action.action(),
                                target: action.target,
                                error: format!("{err:#}"),
                            }
                        }
                    }
                }
            };

            reports.push(ActionReport {
                directive: candidate.raw.to_string(),
                outcome,
            });
        }

        reports
    }

    /// Send the reply as a notification without waiting for it
    fn notify_detached(&self, message: String) {
        let notifier = Arc::clone(&self.notifier);
        self.lock_background().spawn(async move {
            if let Err(err) = notifier.notify(NOTIFICATION_TITLE, &message).await {
                log::warn!("Could not send response notification: {err:#}");
            }
        });
    }

    /// Give detached tasks up to `timeout` to finish, then abandon them
    pub async fn drain_background(&self, timeout: Duration) {
        let mut tasks = std::mem::take(&mut *self.lock_background());
        if tasks.is_empty() {
            return;
        }

        let finished = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            log::warn!("Abandoning {} unfinished background task(s)", tasks.len());
        }
    }

    fn lock_background(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn failure_speech(err: CompletionError) -> String {
    match err {
        CompletionError::Status { status, body } => {
            log::error!("Perplexity API error: status {status}. Error response: {body}");
            format!("{SERVICE_ERROR} Status code: {}", status.as_u16())
        }
        other => {
            log::error!(
                "Exception while communicating with Perplexity API: {:#}",
                anyhow::Error::new(other)
            );
            SERVICE_ERROR.to_string()
        }
    }
}
