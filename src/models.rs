//! # 数据模型模块
//!
//! 该模块定义了多模型对话中使用的核心数据结构：模型配置与采样参数、
//! 聊天记录、单个模型的回答结果，以及提供给前端展示的文档视图。
//!
//! 所有结构都配合 `serde` 进行 JSON 序列化，字段名与前端约定为 camelCase。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use uuid::Uuid;

use crate::error::ChatError;

/// 温度滑块的取值范围。
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.0..=1.5;
/// 温度滑块的步长。
pub const TEMPERATURE_STEP: f64 = 0.1;
/// Top-p 滑块的取值范围。
pub const TOP_P_RANGE: RangeInclusive<f64> = 0.1..=1.0;
/// Top-p 滑块的步长。
pub const TOP_P_STEP: f64 = 0.05;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;

/// 单个模型的采样参数。
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingParams {
    /// 温度，越高回答越发散。
    pub temperature: f64,
    /// 核采样阈值。
    pub top_p: f64,
}

impl SamplingParams {
    /// 创建并校验采样参数，超出滑块范围的值会被拒绝。
    pub fn new(temperature: f64, top_p: f64) -> Result<Self, ChatError> {
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(ChatError::InvalidParams {
                field: "temperature",
                value: temperature,
            });
        }
        if !TOP_P_RANGE.contains(&top_p) {
            return Err(ChatError::InvalidParams {
                field: "top_p",
                value: top_p,
            });
        }
        Ok(Self { temperature, top_p })
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// 配置文件中声明的模型：显示名称与服务商的模型标识。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// 唯一且稳定的显示名称，同时作为结果映射的键。
    pub name: String,
    /// 服务商侧的模型 ID（如 "deepseek/deepseek-r1-0528:free"）。
    pub model_id: String,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
        }
    }
}

/// 会话中某个模型的当前配置（模型 + 用户调整后的参数）。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub name: String,
    pub model_id: String,
    pub params: SamplingParams,
}

impl From<&ModelSpec> for ModelConfig {
    fn from(spec: &ModelSpec) -> Self {
        Self {
            name: spec.name.clone(),
            model_id: spec.model_id.clone(),
            params: SamplingParams::default(),
        }
    }
}

/// 单个模型在一轮对话中的回答。创建后不再修改。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelResult {
    /// 模型的回答正文，失败时为错误描述。
    pub text: String,
    /// 请求耗时（秒），失败时为 `None`。
    pub elapsed_secs: Option<f64>,
    /// 本次请求实际使用的参数。
    pub params: SamplingParams,
}

impl ModelResult {
    pub fn success(text: String, elapsed_secs: f64, params: SamplingParams) -> Self {
        Self {
            text,
            elapsed_secs: Some(elapsed_secs),
            params,
        }
    }

    pub fn failure(message: String, params: SamplingParams) -> Self {
        Self {
            text: message,
            elapsed_secs: None,
            params,
        }
    }

    pub fn is_error(&self) -> bool {
        self.elapsed_secs.is_none()
    }

    /// 结果标题上的耗时信息，例如 `⏱️ 1.23s`；失败时为 `❌`。
    pub fn headline(&self) -> String {
        match self.elapsed_secs {
            Some(secs) => format!("⏱️ {:.2}s", secs),
            None => "❌".to_string(),
        }
    }

    pub fn params_caption(&self) -> String {
        format!(
            "🌡 Temp: {} | 🎯 Top-p: {}",
            self.params.temperature, self.params.top_p
        )
    }
}

/// 一轮扇出查询的结果：模型名称 -> 回答。
pub type TurnResults = BTreeMap<String, ModelResult>;

/// 助手消息的内容。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", content = "results", rename_all = "lowercase")]
pub enum AssistantContent {
    /// 占位符：请求已发出，等待所有模型返回。
    Pending,
    /// 所有模型均已返回（成功或失败）。
    Resolved(TurnResults),
}

/// 聊天记录中的一条消息。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    User { id: Uuid, content: String },
    Assistant { id: Uuid, content: AssistantContent },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            id: Uuid::new_v4(),
            content: content.into(),
        }
    }

    pub fn pending() -> Self {
        ChatMessage::Assistant {
            id: Uuid::new_v4(),
            content: AssistantContent::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ChatMessage::User { id, .. } | ChatMessage::Assistant { id, .. } => *id,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, ChatMessage::User { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ChatMessage::Assistant {
                content: AssistantContent::Pending,
                ..
            }
        )
    }

    /// 已完成的助手消息中的结果映射。
    pub fn results(&self) -> Option<&TurnResults> {
        match self {
            ChatMessage::Assistant {
                content: AssistantContent::Resolved(results),
                ..
            } => Some(results),
            _ => None,
        }
    }
}

/// 会话中持有的文档的元数据信息。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DocumentInfo {
    /// 文件名。
    pub name: String,
    /// 原始字节数。
    pub size: usize,
}

/// 文档预览：提取成功时给出前若干字符，失败时给出带文件名的错误信息。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DocumentPreview {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_outside_slider_range_are_rejected() {
        assert!(SamplingParams::new(0.0, 0.1).is_ok());
        assert!(SamplingParams::new(1.5, 1.0).is_ok());
        assert!(matches!(
            SamplingParams::new(1.6, 1.0),
            Err(ChatError::InvalidParams { field: "temperature", .. })
        ));
        assert!(matches!(
            SamplingParams::new(0.7, 0.05),
            Err(ChatError::InvalidParams { field: "top_p", .. })
        ));
        assert!(SamplingParams::new(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn result_headline_reflects_failure() {
        let params = SamplingParams::new(0.9, 0.5).unwrap();
        let ok = ModelResult::success("hi".into(), 1.234, params);
        let failed = ModelResult::failure("❌ Error: boom".into(), params);

        assert_eq!(ok.headline(), "⏱️ 1.23s");
        assert!(!ok.is_error());
        assert_eq!(failed.headline(), "❌");
        assert!(failed.is_error());
        assert_eq!(ok.params_caption(), "🌡 Temp: 0.9 | 🎯 Top-p: 0.5");
    }

    #[test]
    fn messages_serialize_with_role_tag() {
        let user = serde_json::to_value(ChatMessage::user("hello")).unwrap();
        assert_eq!(user["role"], "user");
        assert_eq!(user["content"], "hello");

        let pending = serde_json::to_value(ChatMessage::pending()).unwrap();
        assert_eq!(pending["role"], "assistant");
        assert_eq!(pending["content"]["status"], "pending");
    }
}
