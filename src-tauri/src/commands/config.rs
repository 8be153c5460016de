use crate::models::ModelView;
use multichat::models::SamplingParams;
use multichat::{AppConfig, SessionRegistry};
use tauri::Window;

/// 侧边栏：当前会话中所有模型及其参数、滑块范围
#[tauri::command]
pub async fn list_models(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
) -> Result<Vec<ModelView>, String> {
    let session = registry.get_or_create(window.label());
    let session = session.lock().await;
    Ok(session.models().iter().map(ModelView::from).collect())
}

#[tauri::command]
pub async fn get_model_params(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
    name: String,
) -> Result<SamplingParams, String> {
    let session = registry.get_or_create(window.label());
    let params = session.lock().await.params(&name).map_err(|e| e.to_string())?;
    Ok(params)
}

/// 滑块变化时调用，下一轮对话生效
#[tauri::command]
pub async fn set_model_params(
    window: Window,
    registry: tauri::State<'_, SessionRegistry>,
    name: String,
    temperature: f64,
    top_p: f64,
) -> Result<SamplingParams, String> {
    let params = SamplingParams::new(temperature, top_p).map_err(|e| e.to_string())?;
    let session = registry.get_or_create(window.label());
    session
        .lock()
        .await
        .set_params(&name, params)
        .map_err(|e| e.to_string())?;
    Ok(params)
}

/// 读取应用程序配置（模型列表、接口地址、提示词）
#[tauri::command]
pub fn load_app_config() -> Result<AppConfig, String> {
    AppConfig::load().map_err(|e| e.to_string())
}

/// 保存应用程序配置，重启后对新会话生效
#[tauri::command]
pub fn save_app_config(config: AppConfig) -> Result<(), String> {
    config.save().map_err(|e| e.to_string())
}
