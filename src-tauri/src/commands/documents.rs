//! 文档相关命令：上传、重置、预览。
//!
//! 文件只保存在当前窗口的会话里，最多 5 个，关闭窗口即丢弃。

use crate::models::UploadPayload;
use multichat::documents::{build_context, UploadedDocument};
use multichat::models::{DocumentInfo, DocumentPreview};
use multichat::SessionRegistry;
use tauri::Window;

/// 用前端读取到的文件内容替换当前文件列表，返回实际保留的文件
#[tauri::command]
pub async fn upload_documents(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
    files: Vec<UploadPayload>,
) -> Result<Vec<DocumentInfo>, String> {
    let documents = files
        .into_iter()
        .map(|f| UploadedDocument::new(f.name, f.bytes))
        .collect();

    let session = registry.get_or_create(window.label());
    let mut session = session.lock().await;
    session.replace_documents(documents);
    Ok(session.document_infos())
}

/// 用对话框选中的路径上传文件，由后端负责读取
#[tauri::command]
pub async fn upload_document_paths(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
    paths: Vec<String>,
) -> Result<Vec<DocumentInfo>, String> {
    let documents = tauri::async_runtime::spawn_blocking(move || {
        paths
            .iter()
            .map(UploadedDocument::from_path)
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())?;

    let session = registry.get_or_create(window.label());
    let mut session = session.lock().await;
    session.replace_documents(documents);
    Ok(session.document_infos())
}

/// “重置文档”按钮：只清空文件，聊天记录保持不变
#[tauri::command]
pub async fn reset_documents(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
) -> Result<(), String> {
    let session = registry.get_or_create(window.label());
    session.lock().await.reset_documents();
    Ok(())
}

/// 提取当前所有文件，返回每个文件的预览或带文件名的错误信息
#[tauri::command]
pub async fn preview_documents(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
) -> Result<Vec<DocumentPreview>, String> {
    let session = registry.get_or_create(window.label());
    let documents = session.lock().await.documents().to_vec();

    // PDF 解析较重，放到阻塞线程池
    let context = tauri::async_runtime::spawn_blocking(move || build_context(&documents))
        .await
        .map_err(|e| e.to_string())?;
    Ok(context.previews)
}
