//! 应用配置：模型列表、接口地址、提示词，以及从环境变量读取的 API 密钥。
//!
//! 配置文件保存在系统配置目录下的 `multichat/config.json`
//! （如 Linux 的 `~/.config`），文件不存在时使用内置默认值。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::ModelSpec;

/// 存放 API 密钥的环境变量名。
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const CONFIG_DIR_NAME: &str = "multichat";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法获取系统配置目录")]
    NoConfigDir,
    #[error("读写配置文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("配置文件格式错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 应用程序的全局配置文件结构。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// OpenAI 兼容接口的基地址。
    pub api_url: String,
    /// 参与每一轮对话的模型，顺序即侧边栏顺序。
    pub models: Vec<ModelSpec>,
    /// 每个请求的第一条 system 消息。
    pub system_prompt: String,
    /// 注入文档上下文时放在上下文前面的说明。
    pub context_instruction: String,
    /// 会话最多同时持有的文档数。
    pub max_documents: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1".into(),
            models: vec![
                ModelSpec::new("Kimi K2", "moonshotai/kimi-k2:free"),
                ModelSpec::new("DeepSeek R1", "deepseek/deepseek-r1-0528:free"),
                ModelSpec::new("DeepSeek Chat V3", "deepseek/deepseek-chat-v3-0324:free"),
            ],
            system_prompt: "You are a helpful assistant.".into(),
            context_instruction: "Use the following information if relevant:".into(),
            max_documents: 5,
        }
    }
}

impl AppConfig {
    /// 默认配置文件路径。
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR_NAME);
        path.push(CONFIG_FILE_NAME);
        Ok(path)
    }

    /// 从默认位置读取配置，文件不存在时返回默认配置。
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path()?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), models = config.models.len(), "loaded config");
        Ok(config)
    }

    /// 写入默认位置，目录不存在时自动创建。
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 模型名称必须非空且唯一，至少一个模型，至少允许一个文档。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("至少需要配置一个模型".into()));
        }
        let mut seen = HashSet::new();
        for model in &self.models {
            if model.name.trim().is_empty() {
                return Err(ConfigError::Invalid("模型名称不能为空".into()));
            }
            if !seen.insert(model.name.as_str()) {
                return Err(ConfigError::Invalid(format!("模型名称重复: {}", model.name)));
            }
        }
        if self.max_documents == 0 {
            return Err(ConfigError::Invalid("maxDocuments 必须大于 0".into()));
        }
        Ok(())
    }
}

/// Bearer 凭证。缺失时不在启动阶段报错，而是让每次请求在发送时失败。
#[derive(Clone, Default)]
pub struct ApiCredential(Option<String>);

impl ApiCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    pub fn missing() -> Self {
        Self(None)
    }

    /// 加载 `.env`（不存在则忽略）后读取 [`API_KEY_ENV`]。
    pub fn from_env() -> Self {
        if let Err(e) = dotenv::dotenv() {
            debug!("no .env loaded: {}", e);
        }
        Self::from_var(API_KEY_ENV)
    }

    pub fn from_var(name: &str) -> Self {
        Self(std::env::var(name).ok().filter(|key| !key.trim().is_empty()))
    }

    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("ApiCredential(<redacted>)"),
            None => f.write_str("ApiCredential(<missing>)"),
        }
    }
}
