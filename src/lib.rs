//! 多模型对话核心库。
//!
//! 同一个问题同时发给多个托管模型，可选地把上传文档的文本作为上下文，
//! 并在内存中维护单个会话的聊天记录、模型参数和文件列表。
//! 桌面壳（`src-tauri`）和命令行工具都建立在这个库之上。

pub mod config;
pub mod dispatcher;
pub mod documents;
pub mod error;
pub mod llm;
pub mod models;
pub mod session;
pub mod turn;

pub use config::{ApiCredential, AppConfig, ConfigError};
pub use dispatcher::Dispatcher;
pub use documents::{build_context, extract_text, DocumentContext, ExtractError, UploadedDocument};
pub use error::ChatError;
pub use llm::{CompletionClient, CompletionRequest, LlmError, Message, OpenAiCompatClient};
pub use models::{ChatMessage, ModelConfig, ModelResult, ModelSpec, SamplingParams, TurnResults};
pub use session::{Session, SessionRegistry, TurnState};
pub use turn::{ChatService, TurnOutcome};

use tracing_subscriber::EnvFilter;

/// 初始化日志输出，级别由 `RUST_LOG` 控制，默认 `info`。
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化（例如测试中）直接忽略
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
