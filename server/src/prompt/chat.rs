use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    server_config::cfg,
    HttpClient,
};

const AI_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";

/// Text generation as the extractors need it: one prompt in, one completion
/// out.
#[allow(async_fn_in_trait)]
pub trait Generator {
    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

#[derive(Clone)]
pub struct ChatClient {
    http_client: HttpClient,
}

impl ChatClient {
    pub fn new(http_client: HttpClient) -> Self {
        ChatClient { http_client }
    }
}

impl Generator for ChatClient {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let resp = self
            .http_client
            .post(AI_ENDPOINT)
            .bearer_auth(&cfg.api.key)
            .json(&json!(
              {
                "model": &cfg.model.id,
                "temperature": cfg.model.temperature,
                "messages": [
                  {
                    "role": "user",
                    "content": prompt
                  }
                ]
              }
            ))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| {
                if let Some(status) = e.status() {
                    match status {
                        StatusCode::BAD_REQUEST => AppError::BadRequest(e.to_string()),
                        StatusCode::REQUEST_TIMEOUT => AppError::RequestTimeout,
                        StatusCode::TOO_MANY_REQUESTS => AppError::TooManyRequests,
                        _ => AppError::Internal(e.into()),
                    }
                } else {
                    AppError::Internal(e.into())
                }
            })?;

        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
            .context(format!("Could not parse chat response: {}", resp))?;

        let parsed = match parsed {
            ChatApiResponseOrError::Error(error) => {
                return Err(anyhow!("Chat API error: {:?}", error).into());
            }
            ChatApiResponseOrError::Response(parsed) => parsed,
        };

        let choice = parsed.choices.first().context("No choices in response")?;

        Ok(choice.message.content.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    Error,
    ToolCalls,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: PromptUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiError),
}
