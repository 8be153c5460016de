use crate::models::TurnPayload;
use multichat::models::{ChatMessage, TurnResults};
use multichat::{ChatService, SessionRegistry};
use std::sync::Arc;
use tauri::{Emitter, Window}; // Emitter 用于从后端向前端推送事件
use tracing::{error, info};

/// 本轮已写入占位消息，模型请求即将发出
pub const CHAT_PENDING: &str = "chat-pending";
/// 全部模型已返回，占位消息已被替换
pub const CHAT_RESOLVED: &str = "chat-resolved";

fn emit_turn(window: &Window, event: &str, payload: TurnPayload) {
    if let Err(e) = window.emit(event, payload) {
        error!("failed to emit {}: {}", event, e);
    }
}

/// 核心函数：把用户输入同时发给所有模型，全部返回后一次性回传结果
/// #[tauri::command] 允许前端通过 invoke 调用
#[tauri::command]
pub async fn send_message(
    window: Window,                               // Tauri 窗口句柄，label 即会话 ID
    registry: tauri::State<'_, SessionRegistry>,  // 全部会话
    service: tauri::State<'_, Arc<ChatService>>,  // 扇出查询服务
    input: String,                                // 用户输入
) -> Result<TurnResults, String> {
    let session_id = window.label().to_string();
    let session = registry.get_or_create(&session_id);

    // 1. 写入用户消息和占位消息，前端据此显示“等待中”
    let turn = service
        .begin(&session, &input)
        .await
        .map_err(|e| e.to_string())?;
    let message_id = turn.placeholder_id();
    emit_turn(
        &window,
        CHAT_PENDING,
        TurnPayload {
            session_id: session_id.clone(),
            message_id,
            results: None,
            failures: Vec::new(),
        },
    );
    info!(session = %session_id, "turn started");

    // 2. 等待所有模型返回（单个模型失败已包含在结果中）
    let outcome = service
        .complete(&session, turn)
        .await
        .map_err(|e| e.to_string())?;

    // 3. 通知前端用完整结果替换占位消息
    emit_turn(
        &window,
        CHAT_RESOLVED,
        TurnPayload {
            session_id,
            message_id,
            results: Some(outcome.results.clone()),
            failures: outcome.failures,
        },
    );
    Ok(outcome.results)
}

/// 读取当前窗口会话的完整聊天记录
#[tauri::command]
pub async fn get_history(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
) -> Result<Vec<ChatMessage>, String> {
    let session = registry.get_or_create(window.label());
    let history = session.lock().await.history().to_vec();
    Ok(history)
}
