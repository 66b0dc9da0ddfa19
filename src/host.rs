//! Collaborators the agent needs from the home-automation host
//!
//! The agent only talks to the host through these traits. The Home Assistant
//! REST client implements all three; tests use in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier and current state of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: String,
    pub state: String,
}

impl EntitySnapshot {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
        }
    }
}

/// Read-only view of every entity the host knows about
#[async_trait]
pub trait EntityRegistry: Send + Sync {
    async fn all_states(&self) -> Result<Vec<EntitySnapshot>>;
}

/// Performs `domain.service` on a target entity
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, domain: &str, service: &str, target: &str) -> Result<()>;
}

/// Best-effort user-facing notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

#[cfg(test)]
pub mod fake {
    //! In-memory host used by the pipeline tests

    use std::sync::Mutex;

    use anyhow::bail;

    use super::*;

    #[derive(Debug, Default)]
    pub struct FakeHost {
        pub states: Vec<EntitySnapshot>,
        pub fail_states: bool,
        /// Services whose dispatch returns an error
        pub failing_services: Vec<String>,
        pub fail_notify: bool,
        pub dispatched: Mutex<Vec<(String, String, String)>>,
        pub notifications: Mutex<Vec<(String, String)>>,
        pub state_reads: Mutex<usize>,
    }

    impl FakeHost {
        pub fn with_states(states: &[(&str, &str)]) -> Self {
            Self {
                states: states
                    .iter()
                    .map(|(id, state)| EntitySnapshot::new(*id, *state))
                    .collect(),
                ..Self::default()
            }
        }

        pub fn dispatched(&self) -> Vec<(String, String, String)> {
            self.dispatched.lock().unwrap().clone()
        }

        pub fn notifications(&self) -> Vec<(String, String)> {
            self.notifications.lock().unwrap().clone()
        }

        pub fn state_reads(&self) -> usize {
            *self.state_reads.lock().unwrap()
        }
    }

    #[async_trait]
    impl EntityRegistry for FakeHost {
        async fn all_states(&self) -> Result<Vec<EntitySnapshot>> {
            *self.state_reads.lock().unwrap() += 1;
            if self.fail_states {
                bail!("registry offline");
            }
            Ok(self.states.clone())
        }
    }

    #[async_trait]
    impl ActionDispatcher for FakeHost {
        async fn dispatch(&self, domain: &str, service: &str, target: &str) -> Result<()> {
            if self.failing_services.iter().any(|s| s == service) {
                bail!("service {domain}.{service} not found");
            }
            self.dispatched.lock().unwrap().push((
                domain.to_string(),
                service.to_string(),
                target.to_string(),
            ));
            Ok(())
        }
    }

    #[async_trait]
    impl NotificationSink for FakeHost {
        async fn notify(&self, title: &str, message: &str) -> Result<()> {
            if self.fail_notify {
                bail!("notify service unavailable");
            }
            self.notifications
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }
}
