//! Perplexity chat completion client
//!
//! One POST per prompt; no retries. Errors are typed so the agent can turn
//! them into the right spoken sentence.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::prompt::CompletionRequest;

pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Perplexity API returned HTTP {status}")]
    Status { status: StatusCode, body: String },

    #[error("request to Perplexity API failed")]
    Transport(#[source] reqwest::Error),

    #[error("malformed Perplexity API response")]
    Decode(#[source] serde_json::Error),

    #[error("Perplexity API response contained no choices")]
    NoChoices,
}

/// Text and usage cost of one successful completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub cost: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    cost: Option<UsageCost>,
}

#[derive(Debug, Deserialize)]
struct UsageCost {
    total_cost: Option<f64>,
}

impl ChatResponse {
    fn into_completion(self) -> Result<Completion, CompletionError> {
        let raw_cost = self
            .usage
            .and_then(|usage| usage.cost)
            .and_then(|cost| cost.total_cost);

        let content = self
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::NoChoices)?
            .message
            .content;

        Ok(Completion {
            content,
            cost: sanitize_cost(raw_cost),
        })
    }
}

/// Missing cost counts as zero; so does anything the counters could not add
fn sanitize_cost(raw: Option<f64>) -> f64 {
    match raw {
        Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
        Some(cost) => {
            log::warn!("Ignoring invalid usage cost reported by Perplexity: {cost}");
            0.0
        }
        None => 0.0,
    }
}

/// Client for the chat completions endpoint
pub struct CompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("pplx-assist/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Send one completion request
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        log::debug!("POST {} (model={})", self.endpoint, request.model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(CompletionError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(CompletionError::Transport)?;

        if status != StatusCode::OK {
            return Err(CompletionError::Status { status, body });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(CompletionError::Decode)?;
        parsed.into_completion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Language, Model};
    use crate::prompt::build_request;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        build_request(Model::SonarSmallOnline, Language::En, "", "summary", "hello")
    }

    fn client_for(server: &MockServer) -> CompletionClient {
        CompletionClient::new(
            &format!("{}/chat/completions", server.uri()),
            "pplx-test",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_cost_defaults_to_zero() {
        let parsed: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "hi"}}]})).unwrap();
        assert_eq!(
            parsed.into_completion().unwrap(),
            Completion {
                content: "hi".to_string(),
                cost: 0.0
            }
        );
    }

    #[test]
    fn test_partial_usage_defaults_to_zero() {
        let parsed: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "hi"}}],
            "usage": {"prompt_tokens": 10}
        }))
        .unwrap();
        assert_eq!(parsed.into_completion().unwrap().cost, 0.0);
    }

    #[test]
    fn test_negative_cost_is_ignored() {
        assert_eq!(sanitize_cost(Some(-1.0)), 0.0);
        assert_eq!(sanitize_cost(Some(f64::NAN)), 0.0);
        assert_eq!(sanitize_cost(Some(0.25)), 0.25);
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let parsed: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            parsed.into_completion(),
            Err(CompletionError::NoChoices)
        ));
    }

    #[tokio::test]
    async fn test_complete_sends_bearer_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer pplx-test"))
            .and(body_partial_json(json!({"model": "sonar-small-online", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Hello there"}}],
                "usage": {"cost": {"total_cost": 0.004}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = client_for(&server).complete(&request()).await.unwrap();
        assert_eq!(completion.content, "Hello there");
        assert_eq!(completion.cost, 0.004);
    }

    #[tokio::test]
    async fn test_complete_reports_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        match client_for(&server).complete(&request()).await {
            Err(CompletionError::Status { status, body }) => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_rejects_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).complete(&request()).await,
            Err(CompletionError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": "late"}}]}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = CompletionClient::new(
            &format!("{}/chat/completions", server.uri()),
            "pplx-test",
            Duration::from_millis(50),
        )
        .unwrap();

        assert!(matches!(
            client.complete(&request()).await,
            Err(CompletionError::Transport(_))
        ));
    }
}
