//! 一轮对话的完整流程：提交 -> 占位 -> 扇出 -> 写回结果。

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{ApiCredential, AppConfig};
use crate::dispatcher::Dispatcher;
use crate::documents::{build_context, DocumentContext, ExtractionFailure};
use crate::error::ChatError;
use crate::llm::{CompletionClient, OpenAiCompatClient};
use crate::models::TurnResults;
use crate::session::{PendingTurn, Session};

/// 一轮对话的结果：每个模型的回答，以及本轮提取失败的文件。
#[derive(Serialize, Debug, Clone)]
pub struct TurnOutcome {
    pub results: TurnResults,
    pub failures: Vec<ExtractionFailure>,
}

pub struct ChatService {
    dispatcher: Dispatcher,
}

impl ChatService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// 按配置创建连接 OpenAI 兼容接口的服务。
    pub fn from_config(config: &AppConfig, credential: ApiCredential) -> Self {
        let client: Arc<dyn CompletionClient> =
            Arc::new(OpenAiCompatClient::new(&config.api_url, credential));
        Self::with_client(config, client)
    }

    pub fn with_client(config: &AppConfig, client: Arc<dyn CompletionClient>) -> Self {
        Self::new(Dispatcher::new(
            client,
            config.system_prompt.clone(),
            config.context_instruction.clone(),
        ))
    }

    /// 写入用户消息和占位消息后立即释放会话锁，
    /// 这样在等待模型期间前端仍能读取到 pending 状态。
    pub async fn begin(&self, session: &Mutex<Session>, input: &str) -> Result<PendingTurn, ChatError> {
        session.lock().await.begin_turn(input)
    }

    /// 提取文档、扇出请求，再把结果写回占位消息。
    ///
    /// 扇出期间不持有会话锁；会话只在全部任务结束后被修改。
    pub async fn complete(&self, session: &Mutex<Session>, turn: PendingTurn) -> Result<TurnOutcome, ChatError> {
        // PDF 解析较重，放到阻塞线程池
        let documents = turn.documents.clone();
        let context = match tokio::task::spawn_blocking(move || build_context(&documents)).await {
            Ok(context) => context,
            Err(e) => {
                // 提取线程崩溃时本轮不带文档上下文，每个文件都记为失败
                warn!("document extraction task failed: {}", e);
                DocumentContext {
                    failures: turn
                        .documents
                        .iter()
                        .map(|doc| ExtractionFailure {
                            name: doc.name.clone(),
                            message: format!("读取 {} 失败: {}", doc.name, e),
                        })
                        .collect(),
                    ..DocumentContext::default()
                }
            }
        };

        let results = self
            .dispatcher
            .dispatch(&turn.input, &context.text, &turn.models)
            .await;

        session.lock().await.resolve_turn(&turn, results.clone())?;
        info!(models = results.len(), "turn resolved");

        Ok(TurnOutcome {
            results,
            failures: context.failures,
        })
    }

    /// `begin` + `complete`。
    pub async fn submit(&self, session: &Mutex<Session>, input: &str) -> Result<TurnOutcome, ChatError> {
        let turn = self.begin(session, input).await?;
        self.complete(session, turn).await
    }
}
