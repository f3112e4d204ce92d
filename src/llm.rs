//! Language-model capability used to generate answers.
//!
//! [`LanguageModel::complete`] turns a fully assembled prompt into text.
//! Backends:
//! - **[`DisabledModel`]**: always fails; used when `[llm]` is not configured.
//! - **[`OpenAIChatModel`]**: `POST /v1/chat/completions`, prompt sent as a
//!   single user message. Requires `OPENAI_API_KEY`.
//! - **[`OllamaModel`]**: `POST /api/generate` with streaming disabled.
//!
//! Connectivity, authentication and malformed-response failures are all
//! reported as [`RagError::ProviderError`]; client-side timeouts as
//! [`RagError::ProviderTimeout`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{RagError, Result};

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(RagError::InvalidConfig(
            "language model is disabled; set [llm] provider in config".into(),
        ))
    }
}

fn http_error(err: reqwest::Error, timeout_secs: u64) -> RagError {
    if err.is_timeout() {
        RagError::ProviderTimeout(timeout_secs)
    } else {
        RagError::ProviderError(err.to_string())
    }
}

// ============ OpenAI ============

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAIChatModel {
    model: String,
    api_key: String,
    temperature: Option<f32>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAIChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::InvalidConfig("llm.model required for OpenAI provider".into()))?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::InvalidConfig("OPENAI_API_KEY environment variable not set".into())
        })?;
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            model,
            api_key,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::ProviderError(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| http_error(e, self.timeout_secs))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::ProviderError("OpenAI response contained no content".into()))
    }
}

// ============ Ollama ============

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaModel {
    model: String,
    url: String,
    temperature: Option<f32>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::InvalidConfig("llm.model required for Ollama provider".into()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            model,
            url,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self
                .temperature
                .map(|temperature| GenerateOptions { temperature }),
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::ProviderError(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| http_error(e, self.timeout_secs))?;
        Ok(parsed.response)
    }
}

/// Create the [`LanguageModel`] named by `[llm] provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" => Ok(Arc::new(OpenAIChatModel::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        other => Err(RagError::InvalidConfig(format!(
            "unknown llm provider: {}",
            other
        ))),
    }
}
