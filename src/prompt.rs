//! Completion payload assembly

use serde::{Deserialize, Serialize};

use crate::config::{Language, Model};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

/// Global role prompt: who the assistant is and how it requests actions
pub fn system_prompt(language: Language) -> String {
    format!(
        "You are Perplexity Assistant, a voice assistant integrated into Home Assistant. \
        Answer the user's question concisely, in a way that sounds natural when read aloud, \
        and always reply in {language}. \
        When the user asks you to control a device and you know the matching entity id \
        from the context, add one line per action using exactly this format:\n\
        ACTION: <domain>.<service> - <entity_id>\n\
        For example: ACTION: light.turn_on - light.kitchen\n\
        Never invent entity ids and never emit an ACTION line for a question that does not \
        ask for a change.",
        language = language.name()
    )
}

/// Assemble the three-message payload for one prompt
pub fn build_request(
    model: Model,
    language: Language,
    custom_system_prompt: &str,
    entities_summary: &str,
    prompt: &str,
) -> CompletionRequest {
    CompletionRequest {
        model: model.as_str().to_string(),
        messages: vec![
            Message::system(system_prompt(language)),
            Message::system(format!(
                "Here is a summary of the Home Assistant entities for context: {entities_summary}"
            )),
            Message::user(format!(
                "USER SYSTEM PROMPT: {custom_system_prompt} | USER PROMPT: {prompt}"
            )),
        ],
        stream: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_request_layout() {
        let request = build_request(
            Model::Gpt4,
            Language::En,
            "Be brief.",
            "Access not allowed.",
            "What's the weather?",
        );

        assert_eq!(request.model, "gpt-4");
        assert!(!request.stream);
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(
            request.messages[1].content,
            "Here is a summary of the Home Assistant entities for context: Access not allowed."
        );
        assert_eq!(request.messages[2].role, Role::User);
        assert_eq!(
            request.messages[2].content,
            "USER SYSTEM PROMPT: Be brief. | USER PROMPT: What's the weather?"
        );
    }

    #[test]
    fn test_system_prompt_names_language_and_format() {
        let prompt = system_prompt(Language::Fr);
        assert!(prompt.contains("reply in French"));
        assert!(prompt.contains("ACTION: <domain>.<service> - <entity_id>"));
    }

    #[test]
    fn test_request_wire_shape() {
        let request = build_request(Model::SonarSmallOnline, Language::En, "", "s", "p");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "sonar-small-online");
        assert_eq!(value["stream"], json!(false));
        assert_eq!(value["messages"][1]["role"], "system");
        assert_eq!(value["messages"][2]["role"], "user");
    }
}
