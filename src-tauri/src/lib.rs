// src-tauri/src/lib.rs
mod commands;
mod models;

use multichat::{init_logging, ApiCredential, AppConfig, ChatService, SessionRegistry};
use std::sync::Arc;
use tauri::Manager;
use tracing::{info, warn};

use commands::config::*;
use commands::documents::*;
use commands::llm::*;

// --- 应用程序入口 ---

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_logging();

    // 配置文件损坏时不阻止启动，退回默认配置
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    // 密钥缺失不在这里报错，每次模型请求时各自失败
    let credential = ApiCredential::from_env();
    if !credential.is_present() {
        warn!("OPENROUTER_API_KEY is not set, every model call will fail");
    }
    info!(models = config.models.len(), api_url = %config.api_url, "starting multichat");

    let service = Arc::new(ChatService::from_config(&config, credential));

    tauri::Builder::default()
        .manage(SessionRegistry::new(config))
        .manage(service)
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            send_message,
            get_history,
            upload_documents,
            upload_document_paths,
            reset_documents,
            preview_documents,
            list_models,
            get_model_params,
            set_model_params,
            load_app_config,
            save_app_config
        ])
        .on_window_event(|window, event| {
            // 窗口关闭即会话结束，丢弃该会话的全部状态
            if let tauri::WindowEvent::Destroyed = event {
                window.state::<SessionRegistry>().end(window.label());
            }
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(test)]
mod tests {
    #[test]
    fn window_runs_under_a_content_security_policy() {
        let conf: serde_json::Value =
            serde_json::from_str(include_str!("../tauri.conf.json")).unwrap();
        let csp = conf["app"]["security"]["csp"].as_str().unwrap();
        assert!(csp.contains("default-src 'self'"));
        assert!(csp.contains("script-src 'self'"));
        assert!(!csp.contains("unsafe-eval"));
    }

    #[test]
    fn frontend_never_assigns_html() {
        let script = include_str!("../../ui/main.js");
        let page = include_str!("../../ui/index.html");
        assert!(!script.contains("innerHTML"));
        assert!(!page.contains("<script>"));
    }
}
