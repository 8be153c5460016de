//! 扇出查询：同一个问题同时发给所有配置的模型，等全部返回后再汇总。

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::llm::{CompletionClient, CompletionRequest, Message};
use crate::models::{ModelConfig, ModelResult, TurnResults};

/// 构造每个模型收到的三条消息：system 指令、文档上下文、用户原文。
pub fn build_messages(
    system_prompt: &str,
    context_instruction: &str,
    context: &str,
    input: &str,
) -> Vec<Message> {
    vec![
        Message::system(system_prompt),
        Message::user(format!("{}\n{}", context_instruction, context)),
        Message::user(input),
    ]
}

pub struct Dispatcher {
    client: Arc<dyn CompletionClient>,
    system_prompt: String,
    context_instruction: String,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        system_prompt: impl Into<String>,
        context_instruction: impl Into<String>,
    ) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
            context_instruction: context_instruction.into(),
        }
    }

    /// 为每个模型开一个任务并发请求，全部完成后返回 模型名 -> 结果。
    ///
    /// 单个模型的任何错误（包括任务 panic）都会变成该模型的错误结果，
    /// 不影响其他模型；返回的映射中每个模型恰好一项。
    pub async fn dispatch(&self, input: &str, context: &str, models: &[ModelConfig]) -> TurnResults {
        let messages = build_messages(&self.system_prompt, &self.context_instruction, context, input);

        let handles: Vec<_> = models
            .iter()
            .map(|model| {
                let client = self.client.clone();
                let request = CompletionRequest {
                    model_id: model.model_id.clone(),
                    messages: messages.clone(),
                    temperature: model.params.temperature,
                    top_p: model.params.top_p,
                };
                let params = model.params;
                let name = model.name.clone();

                tokio::spawn(async move {
                    let start = Instant::now();
                    match client.complete(&request).await {
                        Ok(text) => {
                            let elapsed = start.elapsed().as_secs_f64();
                            debug!(model = %name, elapsed, "model answered");
                            ModelResult::success(text, elapsed, params)
                        }
                        Err(e) => {
                            warn!(model = %name, "model request failed: {}", e);
                            ModelResult::failure(format!("❌ Error: {}", e), params)
                        }
                    }
                })
            })
            .collect();

        // 等待所有任务结束，不提前返回部分结果
        let joined = join_all(handles).await;

        let results: TurnResults = models
            .iter()
            .zip(joined)
            .map(|(model, outcome)| {
                let result = outcome.unwrap_or_else(|e| {
                    warn!(model = %model.name, "model task aborted: {}", e);
                    ModelResult::failure(format!("❌ Error: {}", e), model.params)
                });
                (model.name.clone(), result)
            })
            .collect();

        info!(
            models = results.len(),
            failed = results.values().filter(|r| r.is_error()).count(),
            "fan-out finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::models::SamplingParams;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 按模型 ID 返回固定结果的假客户端，同时记录收到的请求。
    #[derive(Default)]
    struct ScriptedClient {
        failing: Vec<&'static str>,
        panicking: Vec<&'static str>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            if self.panicking.contains(&request.model_id.as_str()) {
                panic!("boom");
            }
            if self.failing.contains(&request.model_id.as_str()) {
                return Err(LlmError::Network("connection reset".into()));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(format!("answer from {}", request.model_id))
        }
    }

    fn model(name: &str, id: &str) -> ModelConfig {
        ModelConfig {
            name: name.into(),
            model_id: id.into(),
            params: SamplingParams::default(),
        }
    }

    #[test]
    fn three_turns_in_fixed_order() {
        let messages = build_messages("sys", "Use this:", "\n\n### a.txt:\nalpha", "question?");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::system("sys"));
        assert_eq!(messages[1], Message::user("Use this:\n\n\n### a.txt:\nalpha"));
        assert_eq!(messages[2], Message::user("question?"));
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let client = Arc::new(ScriptedClient {
            failing: vec!["a-id"],
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(client.clone(), "sys", "ctx");
        let models = vec![model("A", "a-id"), model("B", "b-id"), model("C", "c-id")];

        let results = dispatcher.dispatch("hi", "", &models).await;

        assert_eq!(results.len(), 3);
        assert!(results["A"].is_error());
        assert!(results["A"].text.starts_with("❌ Error:"));
        assert!(results["A"].text.contains("connection reset"));
        assert_eq!(results["B"].text, "answer from b-id");
        assert!(results["B"].elapsed_secs.unwrap() > 0.0);
        assert_eq!(results["C"].text, "answer from c-id");
        assert_eq!(client.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn panicking_task_becomes_error_result() {
        let client = Arc::new(ScriptedClient {
            panicking: vec!["b-id"],
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(client, "sys", "ctx");
        let models = vec![model("A", "a-id"), model("B", "b-id")];

        let results = dispatcher.dispatch("hi", "", &models).await;

        assert_eq!(results.len(), 2);
        assert!(!results["A"].is_error());
        assert!(results["B"].is_error());
        assert_eq!(results["B"].elapsed_secs, None);
    }

    #[tokio::test]
    async fn each_request_carries_its_own_params() {
        let client = Arc::new(ScriptedClient::default());
        let dispatcher = Dispatcher::new(client.clone(), "sys", "ctx");
        let mut tuned = model("A", "a-id");
        tuned.params = SamplingParams::new(0.9, 0.5).unwrap();
        let models = vec![tuned, model("B", "b-id")];

        let results = dispatcher.dispatch("hi", "", &models).await;

        let seen = client.seen.lock().unwrap();
        let a = seen.iter().find(|r| r.model_id == "a-id").unwrap();
        assert_eq!((a.temperature, a.top_p), (0.9, 0.5));
        let b = seen.iter().find(|r| r.model_id == "b-id").unwrap();
        assert_eq!((b.temperature, b.top_p), (0.7, 1.0));
        assert_eq!(results["A"].params, SamplingParams::new(0.9, 0.5).unwrap());
    }
}
