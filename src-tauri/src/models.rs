//! # 前后端通信模型
//!
//! 该模块定义了 Tauri 命令与事件使用的负载结构。
//! 会话、聊天记录和结果本身的结构在 `multichat::models` 中定义，这里只做包装。

use multichat::documents::ExtractionFailure;
use multichat::models::{ModelConfig, TurnResults, TEMPERATURE_RANGE, TEMPERATURE_STEP, TOP_P_RANGE, TOP_P_STEP};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 一轮对话开始与结束时推送给前端的事件负载
/// （事件名 `chat-pending` / `chat-resolved`）。
#[derive(Serialize, Clone)]
pub struct TurnPayload {
    /// 会话 ID（即窗口 label）。
    pub session_id: String,
    /// 占位消息的 ID，结束事件用它定位要替换的消息。
    pub message_id: Uuid,
    /// `chat-resolved` 时为全部模型的结果。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<TurnResults>,
    /// 本轮提取失败的文件。
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ExtractionFailure>,
}

/// 前端上传的单个文件：文件名与原始字节。
#[derive(Deserialize, Clone, Debug)]
pub struct UploadPayload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// 侧边栏中一个模型的展示信息。
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelView {
    #[serde(flatten)]
    pub config: ModelConfig,
    pub temperature_range: (f64, f64),
    pub temperature_step: f64,
    pub top_p_range: (f64, f64),
    pub top_p_step: f64,
}

impl From<&ModelConfig> for ModelView {
    fn from(config: &ModelConfig) -> Self {
        Self {
            config: config.clone(),
            temperature_range: (*TEMPERATURE_RANGE.start(), *TEMPERATURE_RANGE.end()),
            temperature_step: TEMPERATURE_STEP,
            top_p_range: (*TOP_P_RANGE.start(), *TOP_P_RANGE.end()),
            top_p_step: TOP_P_STEP,
        }
    }
}
