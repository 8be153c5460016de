use thiserror::Error;

/// 会话与对话流程中的错误。
///
/// 单个模型请求失败不会出现在这里，它会被写进该模型的 `ModelResult`。
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("参数 {field} 超出范围: {value}")]
    InvalidParams { field: &'static str, value: f64 },
    #[error("未配置的模型: {0}")]
    UnknownModel(String),
    #[error("输入内容为空")]
    EmptyInput,
    #[error("占位消息已不存在，无法写入本轮结果")]
    StaleTurn,
}
