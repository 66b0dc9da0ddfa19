//! `ACTION:` directives embedded in model replies
//!
//! A directive reads `ACTION: <domain>.<service> - <target>`. Every marker on
//! a line starts a new candidate, so a reply may carry several directives.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

pub const ACTION_MARKER: &str = "ACTION:";

const TARGET_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDirective {
    pub domain: String,
    pub service: String,
    pub target: String,
}

impl ActionDirective {
    /// `domain.service`
    pub fn action(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("expected '<domain>.<service> - <target>', found {0} field(s)")]
    FieldCount(usize),

    #[error("malformed action '{0}', expected '<domain>.<service>'")]
    MalformedAction(String),
}

impl FromStr for ActionDirective {
    type Err = DirectiveError;

    /// Parse the text that follows the `ACTION:` marker
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(TARGET_SEPARATOR).collect();
        let [action, target] = fields[..] else {
            return Err(DirectiveError::FieldCount(fields.len()));
        };

        let (action, target) = (action.trim(), target.trim());
        let parts: Vec<&str> = action.split('.').collect();
        let [domain, service] = parts[..] else {
            return Err(DirectiveError::MalformedAction(action.to_string()));
        };

        if !is_identifier(domain) || !is_identifier(service) {
            return Err(DirectiveError::MalformedAction(action.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            service: service.to_string(),
            target: target.to_string(),
        })
    }
}

fn is_identifier(part: &str) -> bool {
    !part.is_empty() && !part.chars().any(char::is_whitespace)
}

/// One directive candidate found in a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Text after the marker, as written by the model
    pub raw: &'a str,
    pub parsed: Result<ActionDirective, DirectiveError>,
}

pub fn contains_directive(text: &str) -> bool {
    text.contains(ACTION_MARKER)
}

/// Find every directive candidate in `text`, in order of appearance
pub fn scan(text: &str) -> Vec<Candidate<'_>> {
    text.lines()
        .flat_map(|line| line.split(ACTION_MARKER).skip(1))
        .map(|raw| {
            let raw = raw.trim();
            Candidate {
                raw,
                parsed: raw.parse(),
            }
        })
        .collect()
}
