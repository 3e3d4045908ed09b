use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::{parse_decision, AiDecision, AiServiceError, PatientContext, Responder};

#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Responder backed by an OpenAI-compatible chat completions endpoint
/// (Groq by default), constrained to JSON object output.
pub struct GroqResponder {
    config: GroqConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl GroqResponder {
    pub fn new(config: GroqConfig) -> Result<Self, AiServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiServiceError::Unreachable(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AiServiceError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiServiceError::Unreachable(format!(
                        "request timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else {
                    AiServiceError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiServiceError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiServiceError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AiServiceError::EmptyResponse)
    }
}

#[async_trait]
impl Responder for GroqResponder {
    async fn generate(&self, context: &PatientContext) -> Result<AiDecision, AiServiceError> {
        let prompt = build_user_prompt(context)
            .map_err(|e| AiServiceError::Malformed(format!("context encoding: {}", e)))?;

        let raw = self.complete(SYSTEM_PROMPT, &prompt).await?;
        let decision = parse_decision(&raw)?;

        tracing::debug!(
            model = %self.config.model,
            doctor_intervention_required = decision.doctor_intervention_required,
            end_of_conversation = decision.end_of_conversation,
            "AI decision received"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_asks_for_json_object_output() {
        let body = ChatRequest {
            model: "llama3-70b-8192",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.7,
            max_tokens: 1024,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 1024);
    }

    #[test]
    fn response_without_content_deserializes_to_none() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn unreachable_provider_is_reported() {
        let responder = GroqResponder::new(GroqConfig {
            api_key: "test".into(),
            base_url: "http://127.0.0.1:9".into(),
            model: "llama3-70b-8192".into(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = responder.complete("system", "prompt").await.unwrap_err();
        assert!(matches!(err, AiServiceError::Unreachable(_)));
    }
}
