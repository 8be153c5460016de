//! 会话状态：聊天记录、每个模型的参数、当前持有的文档。
//!
//! 状态只存在于内存中，随会话创建、随会话销毁。

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::documents::UploadedDocument;
use crate::error::ChatError;
use crate::models::{
    AssistantContent, ChatMessage, DocumentInfo, ModelConfig, SamplingParams, TurnResults,
};

/// 一轮对话所处的阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// 用户已提交输入，尚未写入聊天记录。
    Submitted,
    /// 占位消息已插入，等待所有模型返回。
    Pending,
    /// 占位消息已被完整结果替换。
    Resolved,
}

/// `begin_turn` 生成的快照，扇出期间只读。
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub input: String,
    pub documents: Vec<UploadedDocument>,
    pub models: Vec<ModelConfig>,
    placeholder_index: usize,
    placeholder_id: Uuid,
}

impl PendingTurn {
    pub fn placeholder_id(&self) -> Uuid {
        self.placeholder_id
    }
}

#[derive(Debug)]
pub struct Session {
    history: Vec<ChatMessage>,
    models: Vec<ModelConfig>,
    documents: Vec<UploadedDocument>,
    max_documents: usize,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            history: Vec::new(),
            models: config.models.iter().map(ModelConfig::from).collect(),
            documents: Vec::new(),
            max_documents: config.max_documents,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// 所有模型及其当前参数，顺序与配置一致。
    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn params(&self, name: &str) -> Result<SamplingParams, ChatError> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.params)
            .ok_or_else(|| ChatError::UnknownModel(name.to_string()))
    }

    pub fn set_params(&mut self, name: &str, params: SamplingParams) -> Result<(), ChatError> {
        // 经过反序列化的参数可能绕过了 SamplingParams::new，这里再校验一次
        let params = SamplingParams::new(params.temperature, params.top_p)?;
        let model = self
            .models
            .iter_mut()
            .find(|m| m.name == name)
            .ok_or_else(|| ChatError::UnknownModel(name.to_string()))?;
        model.params = params;
        debug!(model = name, ?params, "params updated");
        Ok(())
    }

    pub fn documents(&self) -> &[UploadedDocument] {
        &self.documents
    }

    pub fn document_infos(&self) -> Vec<DocumentInfo> {
        self.documents.iter().map(UploadedDocument::info).collect()
    }

    /// 用新上传的文件替换当前文件列表，只保留前 `max_documents` 个。
    ///
    /// 空列表视为“没有新上传”，保持原状；清空请用 [`Session::reset_documents`]。
    pub fn replace_documents(&mut self, mut documents: Vec<UploadedDocument>) {
        if documents.is_empty() {
            return;
        }
        if documents.len() > self.max_documents {
            info!(
                uploaded = documents.len(),
                kept = self.max_documents,
                "too many documents, truncating"
            );
            documents.truncate(self.max_documents);
        }
        self.documents = documents;
    }

    /// 只清空文件列表，聊天记录和模型参数保持不变。
    pub fn reset_documents(&mut self) {
        self.documents.clear();
    }

    /// 写入用户消息和占位消息，并给扇出过程拍一份快照。
    pub fn begin_turn(&mut self, input: &str) -> Result<PendingTurn, ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        self.history.push(ChatMessage::user(input));
        let placeholder = ChatMessage::pending();
        let placeholder_id = placeholder.id();
        self.history.push(placeholder);

        Ok(PendingTurn {
            input: input.to_string(),
            documents: self.documents.clone(),
            models: self.models.clone(),
            placeholder_index: self.history.len() - 1,
            placeholder_id,
        })
    }

    /// 用完整结果原地覆盖该轮的占位消息。
    pub fn resolve_turn(&mut self, turn: &PendingTurn, results: TurnResults) -> Result<(), ChatError> {
        let slot = self
            .history
            .get_mut(turn.placeholder_index)
            .filter(|msg| msg.id() == turn.placeholder_id && msg.is_pending())
            .ok_or(ChatError::StaleTurn)?;

        *slot = ChatMessage::Assistant {
            id: turn.placeholder_id,
            content: AssistantContent::Resolved(results),
        };
        Ok(())
    }

    /// 最近一轮的状态；还没有任何对话时为 `Submitted`。
    pub fn turn_state(&self) -> TurnState {
        match self.history.last() {
            Some(msg) if msg.is_pending() => TurnState::Pending,
            Some(_) => TurnState::Resolved,
            None => TurnState::Submitted,
        }
    }
}

/// 所有活动会话：会话 ID -> 会话状态。首次访问时创建。
#[derive(Clone)]
pub struct SessionRegistry {
    config: Arc<AppConfig>,
    sessions: Arc<DashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(session = id, "session created");
                Arc::new(Mutex::new(Session::new(&self.config)))
            })
            .clone()
    }

    /// 结束会话并丢弃其全部状态。
    pub fn end(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session = id, "session ended");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
