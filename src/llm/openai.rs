use super::{ChatBackend, ChatOptions, ChatRole, ConversationTurn, truncate};
use crate::error::{PrError, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimal request/response structs for the Chat Completions API.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    role: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI-compatible implementation of ChatBackend.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, api_base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrError::remote(None, format!("failed to build HTTP client: {e}")))?;

        Ok(OpenAiClient {
            client,
            api_key,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        if self.api_base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.api_base_url)
        } else {
            format!("{}/v1/chat/completions", self.api_base_url)
        }
    }
}

impl ChatBackend for OpenAiClient {
    fn send(&self, turns: &[ConversationTurn], options: &ChatOptions) -> Result<String> {
        let req = ChatRequest {
            model: &options.model,
            messages: turns
                .iter()
                .map(|turn| ChatMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        log::info!(
            "Calling model {:?} with {} messages (max_tokens={:?})",
            req.model,
            req.messages.len(),
            req.max_tokens
        );

        let resp = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .map_err(|e| PrError::remote(None, format!("failed to send request: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            let error = parse_api_error(&text);
            let detail = error.message.as_deref().unwrap_or(text.as_str());
            return Err(PrError::remote(
                Some(status.as_u16()),
                format!("{} - {}", describe_failure(status, &error), truncate(detail, 500)),
            ));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .map_err(|e| PrError::remote(None, format!("failed to parse response: {e}")))?;

        if let Some(usage) = &chat_resp.usage {
            log::debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        let message = chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| PrError::remote(None, "no choices returned"))?;

        if let Some(role) = message.role.as_deref() {
            if role != ChatRole::Assistant.as_str() {
                log::warn!("Reply carried unexpected role {role:?}");
            }
        }

        Ok(message.content.unwrap_or_default())
    }
}

/// The `error` object OpenAI-compatible servers put in failure bodies.
#[derive(Debug, Default)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

fn parse_api_error(body: &str) -> ApiError {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return ApiError::default();
    };
    let field = |name: &str| {
        value
            .pointer(&format!("/error/{name}"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    ApiError {
        code: field("code"),
        message: field("message"),
    }
}

/// Name the likely cause of a failed call so it can be logged usefully.
fn describe_failure(status: StatusCode, error: &ApiError) -> &'static str {
    if error.code.as_deref() == Some("context_length_exceeded") {
        return "context length exceeded";
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication failed",
        StatusCode::TOO_MANY_REQUESTS => "rate limited",
        StatusCode::NOT_FOUND => "model not found",
        _ => "API error",
    }
}
