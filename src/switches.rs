//! Feature switches that gate what the agent may do
//!
//! Each switch starts from its configured default and is then restored from
//! the last persisted state, if any.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::PerplexityConfig;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SwitchKind {
    /// Spoken notifications
    VoiceNotifications,
    /// Web search (stored for the host, not used when prompting)
    WebSearch,
    /// Execute ACTION directives from replies
    EntityActions,
    /// Share entity states with the model
    EntityAccess,
}

impl SwitchKind {
    pub const ALL: [SwitchKind; 4] = [
        SwitchKind::VoiceNotifications,
        SwitchKind::WebSearch,
        SwitchKind::EntityActions,
        SwitchKind::EntityAccess,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SwitchKind::VoiceNotifications => "voice-notifications",
            SwitchKind::WebSearch => "web-search",
            SwitchKind::EntityActions => "entity-actions",
            SwitchKind::EntityAccess => "entity-access",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SwitchKind::VoiceNotifications => "Voice responses from the assistant",
            SwitchKind::WebSearch => "Web search",
            SwitchKind::EntityActions => "Let the assistant act on entities",
            SwitchKind::EntityAccess => "Let the assistant read entity states",
        }
    }
}

impl fmt::Display for SwitchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One on/off toggle
#[derive(Debug)]
pub struct Switch {
    on: AtomicBool,
}

impl Switch {
    fn new(on: bool) -> Self {
        Self {
            on: AtomicBool::new(on),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Apply the last known state; `None` keeps the current one
    pub fn restore(&self, last: Option<bool>) {
        if let Some(on) = last {
            self.on.store(on, Ordering::SeqCst);
        }
    }
}

pub fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// All four switches of one agent
#[derive(Debug)]
pub struct Switches {
    voice_notifications: Switch,
    web_search: Switch,
    entity_actions: Switch,
    entity_access: Switch,
}

impl Switches {
    /// Switches at their configured defaults
    pub fn from_config(config: &PerplexityConfig) -> Self {
        Self {
            voice_notifications: Switch::new(true),
            web_search: Switch::new(config.enable_web_search),
            entity_actions: Switch::new(config.allow_actions_on_entities),
            entity_access: Switch::new(config.allow_entities_access),
        }
    }

    pub fn get(&self, kind: SwitchKind) -> &Switch {
        match kind {
            SwitchKind::VoiceNotifications => &self.voice_notifications,
            SwitchKind::WebSearch => &self.web_search,
            SwitchKind::EntityActions => &self.entity_actions,
            SwitchKind::EntityAccess => &self.entity_access,
        }
    }

    pub fn is_on(&self, kind: SwitchKind) -> bool {
        self.get(kind).is_on()
    }

    pub fn restore(&self, saved: &BTreeMap<SwitchKind, bool>) {
        for kind in SwitchKind::ALL {
            self.get(kind).restore(saved.get(&kind).copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let config = PerplexityConfig {
            allow_entities_access: true,
            allow_actions_on_entities: false,
            enable_web_search: false,
            ..PerplexityConfig::default()
        };

        let switches = Switches::from_config(&config);
        assert!(switches.is_on(SwitchKind::VoiceNotifications));
        assert!(!switches.is_on(SwitchKind::WebSearch));
        assert!(!switches.is_on(SwitchKind::EntityActions));
        assert!(switches.is_on(SwitchKind::EntityAccess));
    }

    #[test]
    fn test_restore_overrides_only_saved_switches() {
        let switches = Switches::from_config(&PerplexityConfig::default());
        let saved = BTreeMap::from([
            (SwitchKind::VoiceNotifications, false),
            (SwitchKind::EntityActions, true),
        ]);

        switches.restore(&saved);

        assert!(!switches.is_on(SwitchKind::VoiceNotifications));
        assert!(switches.is_on(SwitchKind::EntityActions));
        assert!(switches.is_on(SwitchKind::WebSearch));
        assert!(!switches.is_on(SwitchKind::EntityAccess));
    }

    #[test]
    fn test_saved_states_use_snake_case_keys() {
        let saved = BTreeMap::from([
            (SwitchKind::VoiceNotifications, true),
            (SwitchKind::EntityAccess, false),
        ]);
        let json = serde_json::to_value(&saved).unwrap();
        assert_eq!(json["voice_notifications"], true);
        assert_eq!(json["entity_access"], false);

        let back: BTreeMap<SwitchKind, bool> = serde_json::from_value(json).unwrap();
        assert_eq!(back, saved);
    }
}
