use crate::error::{PlantOpsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Candidate models, tried in declared order until one answers.
pub const FALLBACK_MODELS: [&str; 3] = [
    "microsoft/phi-3.5-mini-128k-instruct",
    "google/gemini-2.0-flash-exp:free",
    "meta-llama/llama-3.2-11b-vision-instruct:free",
];

/// External text-generation backend consumed by the explanation
/// generator. A non-success status, a network failure and an empty
/// completion are all reported as errors.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String>;
}

pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenRouterClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String> {
        let payload = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.4,
            max_tokens: 800,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://plantops.dev")
            .header("X-Title", "PlantOps")
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlantOpsError::DataSourceUnavailable(format!("openrouter: {}", e)))?;

        if !response.status().is_success() {
            return Err(PlantOpsError::DataSourceUnavailable(format!(
                "openrouter returned {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            PlantOpsError::DataSourceUnavailable(format!("failed to parse completion: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(PlantOpsError::DataSourceUnavailable(
                "empty completion".to_string(),
            ));
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_parses_first_choice() {
        let json = r#"{"choices": [{"message": {"content": "  advice text  "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap();
        assert_eq!(content.trim(), "advice text");
    }

    #[test]
    fn chat_response_tolerates_no_choices() {
        let parsed: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.choices.is_empty());
    }
}
