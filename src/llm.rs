//! OpenAI 兼容的 chat-completion 接口客户端。
//!
//! 每次调用发送一个非流式请求，取第一个 choice 的消息内容。
//! 不设置超时，也不做重试：失败只报告一次。

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ApiCredential;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("未设置 API 密钥 (OPENROUTER_API_KEY)")]
    MissingCredential,
    #[error("网络错误: {0}")]
    Network(String),
    #[error("接口返回 {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("响应格式不正确: {0}")]
    MalformedResponse(String),
}

/// 对话中的一条消息，与 OpenAI 消息格式一致。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    /// "system"、"user" 或 "assistant"
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// 发送给接口的请求体。
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    #[serde(rename = "model")]
    pub model_id: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub top_p: f64,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// 发送一次补全请求，返回第一个 choice 的文本。
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// 基于 reqwest 的 OpenAI 兼容客户端（OpenRouter、本地 llama-server 等）。
#[derive(Clone, Debug)]
pub struct OpenAiCompatClient {
    client: Client,
    endpoint: String,
    credential: ApiCredential,
}

impl OpenAiCompatClient {
    pub fn new(api_url: &str, credential: ApiCredential) -> Self {
        Self {
            client: Client::new(),
            endpoint: completions_endpoint(api_url),
            credential,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// 安全处理 URL，确保以 /chat/completions 结尾。
pub fn completions_endpoint(api_url: &str) -> String {
    let base_url = api_url.trim_end_matches('/');
    if base_url.ends_with("/chat/completions") {
        base_url.to_string()
    } else {
        format!("{}/chat/completions", base_url)
    }
}

/// 从响应体中取出第一个 choice 的内容。
fn parse_completion(body: &str) -> Result<String, LlmError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    // 部分服务商出错时仍返回 200，错误放在 error 字段里
    if let Some(err) = response.error {
        return Err(LlmError::Api {
            status: StatusCode::OK,
            body: err.message.unwrap_or_else(|| "API Error".into()),
        });
    }

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::MalformedResponse("缺少 choices[0].message.content".into()))
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let api_key = self.credential.token().ok_or(LlmError::MissingCredential)?;

        debug!(
            model = %request.model_id,
            temperature = request.temperature,
            top_p = request.top_p,
            "sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Api { status, body });
        }
        parse_completion(&body)
    }
}
