use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentDef, Network};
use crate::config::{EngineConfig, INTERNAL_KEY_ENV};
use crate::engine::{CancelRegistry, StepContext};
use crate::error::{RunError, StepError};
use crate::model::{ContextEntry, ModelClient, ModelRequest};
use crate::prompts::{
    DEFAULT_CONVERSATION_TITLE, FAILURE_ASSISTANT_RESPONSE, FALLBACK_ASSISTANT_RESPONSE,
    TITLE_GENERATOR_SYSTEM_PROMPT, build_system_prompt,
};
use crate::router;
use crate::store::{
    DocumentStore, MessageRecord, MessageRole, MessageStatus, NewMessage,
};
use crate::tools::{self, ContentFetcher, ToolEnv};

/// Payload of the "message sent" trigger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Id of the pre-created assistant placeholder this run will resolve.
    pub message_id: String,
    pub conversation_id: String,
    pub project_id: String,
    pub message: String,
}

/// Everything a run needs from the outside world.
pub struct EngineDeps {
    pub config: EngineConfig,
    pub store: Arc<dyn DocumentStore>,
    pub model: Arc<dyn ModelClient>,
    pub fetcher: Arc<dyn ContentFetcher>,
}

/// Returned by a successful run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub message_id: String,
    pub conversation_id: String,
    pub iterations: usize,
}

/// Durable message-processing workflow: one run per inbound user message.
///
/// Each numbered unit is a named step, so engine-level retries re-enter
/// mid-run without repeating committed side effects.
pub async fn process_message(
    deps: &EngineDeps,
    step: &StepContext,
    event: &MessageEvent,
) -> Result<RunSummary, RunError> {
    let Some(key) = deps.config.internal_key.as_deref() else {
        return Err(RunError::Config(format!(
            "{INTERNAL_KEY_ENV} is not configured"
        )));
    };

    // The triggering message may not be visible to reads yet.
    step.sleep("wait-for-db-sync", deps.config.db_sync_delay).await?;

    let conversation = step
        .run("get-conversation", || async {
            deps.store
                .get_conversation(key, &event.conversation_id)
                .await
                .map_err(StepError::from)
        })
        .await?;
    let Some(conversation) = conversation else {
        return Err(RunError::NonRetriable("Conversation not found".into()));
    };

    let recent = step
        .run("get-recent-messages", || async {
            deps.store
                .recent_messages(key, &event.conversation_id, deps.config.recent_history_limit)
                .await
                .map_err(StepError::from)
        })
        .await?;

    // Drop the message being answered and anything with no information.
    let mut context_messages: Vec<MessageRecord> = recent
        .into_iter()
        .filter(|m| m.id != event.message_id && !m.content.trim().is_empty())
        .collect();
    context_messages.reverse();

    let system_prompt = build_system_prompt(&context_messages);

    // Auto-title at most once, while the conversation still carries the
    // default sentinel. Best-effort: an unusable response is ignored.
    if conversation.title == DEFAULT_CONVERSATION_TITLE {
        let request = ModelRequest {
            model: deps.config.title_model.clone(),
            system: TITLE_GENERATOR_SYSTEM_PROMPT.to_string(),
            context: vec![ContextEntry::User(event.message.clone())],
            tools: vec![],
            params: deps.config.title_params,
        };
        let turn = step
            .run("generate-title", || async {
                deps.model.complete(&request).await
            })
            .await?;

        let title = turn
            .text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        match title {
            Some(title) => {
                step.run("update-conversation-title", || async {
                    deps.store
                        .update_conversation_title(key, &event.conversation_id, &title)
                        .await
                        .map_err(StepError::from)
                })
                .await?;
            }
            None => {
                tracing::warn!(
                    conversation_id = %event.conversation_id,
                    "title generation produced no usable title"
                );
            }
        }
    }

    let agent = AgentDef {
        name: "polaris".into(),
        model: deps.config.coding_model.clone(),
        system: system_prompt,
        params: deps.config.coding_params,
        tools: tools::catalogue(),
    };
    let env = ToolEnv {
        store: &*deps.store,
        fetcher: &*deps.fetcher,
        internal_key: key,
        project_id: &event.project_id,
    };
    let network = Network {
        agent: &agent,
        model: &*deps.model,
        max_iterations: deps.config.max_iterations,
    };
    let run = network.run(step, &env, &event.message).await?;

    let answer = router::final_text(&run.turns)
        .unwrap_or_else(|| FALLBACK_ASSISTANT_RESPONSE.to_string());

    // The single write that resolves the assistant placeholder.
    step.run("update-assistant-message", || async {
        deps.store
            .update_message_content(key, &event.message_id, &answer)
            .await
            .map_err(StepError::from)
    })
    .await?;

    Ok(RunSummary {
        message_id: event.message_id.clone(),
        conversation_id: event.conversation_id.clone(),
        iterations: run.iterations,
    })
}

/// Failure handler: overwrite the placeholder with a fixed apology so no
/// message stays stuck in processing. Best-effort, and only when the
/// credential is configured.
pub async fn handle_failure(deps: &EngineDeps, step: &StepContext, event: &MessageEvent) {
    let Some(key) = deps.config.internal_key.as_deref() else {
        return;
    };
    let result = step
        .run("update-message-on-failure", || async {
            deps.store
                .update_message_content(key, &event.message_id, FAILURE_ASSISTANT_RESPONSE)
                .await
                .map_err(StepError::from)
        })
        .await;
    if let Err(error) = result {
        tracing::warn!(message_id = %event.message_id, %error, "failed to record failure response");
    }
}

/// Drive one event through the workflow the way the execution engine does:
/// register for cancellation, run, route unrecovered errors to the failure
/// handler exactly once, deregister. Cancelled runs are not failures.
pub async fn run_to_completion(
    deps: &EngineDeps,
    registry: &CancelRegistry,
    event: &MessageEvent,
) -> Result<RunSummary, RunError> {
    let cancel = registry.register(&event.message_id);
    let step = StepContext::new(cancel);
    let result = process_message(deps, &step, event).await;

    if let Err(error) = &result
        && !error.is_cancelled()
    {
        tracing::warn!(message_id = %event.message_id, %error, "run failed");
        let failure_step = StepContext::new(CancellationToken::new());
        handle_failure(deps, &failure_step, event).await;
    }

    registry.remove(&event.message_id);
    result
}

/// Message ingress: create the user message, then the assistant placeholder,
/// then hand back the event to enqueue. Both writes happen-before the run,
/// so the placeholder exists before any step can reference it.
pub async fn enqueue_message(
    deps: &EngineDeps,
    conversation_id: &str,
    text: &str,
) -> Result<MessageEvent, RunError> {
    let Some(key) = deps.config.internal_key.as_deref() else {
        return Err(RunError::Config(format!(
            "{INTERNAL_KEY_ENV} is not configured"
        )));
    };

    let conversation = deps
        .store
        .get_conversation(key, conversation_id)
        .await
        .map_err(|e| RunError::NonRetriable(e.to_string()))?;
    let Some(conversation) = conversation else {
        return Err(RunError::NonRetriable("Conversation not found".into()));
    };

    deps.store
        .create_message(
            key,
            NewMessage {
                conversation_id: conversation_id.to_string(),
                project_id: conversation.project_id.clone(),
                role: MessageRole::User,
                content: text.to_string(),
                status: MessageStatus::Completed,
            },
        )
        .await
        .map_err(|e| RunError::NonRetriable(e.to_string()))?;

    let assistant_message_id = deps
        .store
        .create_message(
            key,
            NewMessage {
                conversation_id: conversation_id.to_string(),
                project_id: conversation.project_id.clone(),
                role: MessageRole::Assistant,
                content: String::new(),
                status: MessageStatus::Processing,
            },
        )
        .await
        .map_err(|e| RunError::NonRetriable(e.to_string()))?;

    Ok(MessageEvent {
        message_id: assistant_message_id,
        conversation_id: conversation_id.to_string(),
        project_id: conversation.project_id,
        message: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelTurn;
    use crate::store::MemoryStore;
    use crate::testing::{NullFetcher, ScriptedModel, text_turn, tool_turn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "test-key";

    struct Harness {
        deps: EngineDeps,
        store: Arc<MemoryStore>,
        model: Arc<ScriptedModel>,
        registry: CancelRegistry,
    }

    fn harness(script: Vec<ModelTurn>) -> Harness {
        let store = Arc::new(MemoryStore::new(KEY));
        let model = Arc::new(ScriptedModel::new(script));
        let deps = EngineDeps {
            config: EngineConfig::default().with_internal_key(KEY),
            store: store.clone(),
            model: model.clone(),
            fetcher: Arc::new(NullFetcher),
        };
        Harness {
            deps,
            store,
            model,
            registry: CancelRegistry::new(),
        }
    }

    async fn seeded_event(h: &Harness, title: &str, text: &str) -> MessageEvent {
        let conversation = h.store.seed_conversation("project-1", title);
        enqueue_message(&h.deps, &conversation.id, text).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_resolves_placeholder_exactly_once() {
        let h = harness(vec![
            tool_turn("listFiles", serde_json::json!({})),
            tool_turn("listFiles", serde_json::json!({})),
            tool_turn("listFiles", serde_json::json!({})),
            text_turn("Added the navbar."),
        ]);
        let event = seeded_event(&h, "Todo app", "add a navbar").await;

        let summary = run_to_completion(&h.deps, &h.registry, &event).await.unwrap();
        assert_eq!(summary.iterations, 4);
        assert_eq!(h.model.calls(), 4);

        let message = h.store.message(&event.message_id).unwrap();
        assert_eq!(message.content, "Added the navbar.");
        assert_eq!(message.status, MessageStatus::Completed);
        assert_eq!(h.store.content_write_count(&event.message_id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ingress_creates_user_message_before_placeholder() {
        let h = harness(vec![]);
        let conversation = h.store.seed_conversation("project-1", "Todo app");
        let event = enqueue_message(&h.deps, &conversation.id, "hello").await.unwrap();

        let recent = h
            .deps
            .store
            .recent_messages(KEY, &conversation.id, 10)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, event.message_id);
        assert_eq!(recent[0].role, MessageRole::Assistant);
        assert_eq!(recent[0].status, MessageStatus::Processing);
        assert_eq!(recent[1].role, MessageRole::User);
        assert_eq!(recent[1].content, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credential_aborts_before_any_step() {
        let mut h = harness(vec![]);
        h.deps.config.internal_key = None;
        let event = MessageEvent {
            message_id: "m1".into(),
            conversation_id: "c1".into(),
            project_id: "p1".into(),
            message: "hello".into(),
        };
        let result = run_to_completion(&h.deps, &h.registry, &event).await;
        assert!(matches!(result, Err(RunError::Config(_))));
        assert_eq!(h.model.calls(), 0);
        assert_eq!(h.store.content_write_count("m1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_conversation_fails_and_writes_apology() {
        let h = harness(vec![]);
        let conversation = h.store.seed_conversation("project-1", "Todo app");
        let event = enqueue_message(&h.deps, &conversation.id, "hello").await.unwrap();
        let bad_event = MessageEvent {
            conversation_id: "missing-conversation".into(),
            ..event.clone()
        };

        let result = run_to_completion(&h.deps, &h.registry, &bad_event).await;
        assert!(matches!(result, Err(RunError::NonRetriable(_))));

        let message = h.store.message(&event.message_id).unwrap();
        assert_eq!(message.content, FAILURE_ASSISTANT_RESPONSE);
        assert_eq!(message.status, MessageStatus::Completed);
        assert_eq!(h.store.content_write_count(&event.message_id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn model_failure_routes_to_failure_handler_once() {
        // Empty script: the first coding turn fails non-retriably.
        let h = harness(vec![]);
        let event = seeded_event(&h, "Todo app", "add a navbar").await;

        let result = run_to_completion(&h.deps, &h.registry, &event).await;
        assert!(result.is_err());

        let message = h.store.message(&event.message_id).unwrap();
        assert_eq!(message.content, FAILURE_ASSISTANT_RESPONSE);
        assert_eq!(h.store.content_write_count(&event.message_id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cap_degrades_to_fallback_answer() {
        let script: Vec<_> = (0..20)
            .map(|_| tool_turn("listFiles", serde_json::json!({})))
            .collect();
        let h = harness(script);
        let event = seeded_event(&h, "Todo app", "loop forever").await;

        let summary = run_to_completion(&h.deps, &h.registry, &event).await.unwrap();
        assert_eq!(summary.iterations, 20);
        assert_eq!(h.model.calls(), 20);

        let message = h.store.message(&event.message_id).unwrap();
        assert_eq!(message.content, FALLBACK_ASSISTANT_RESPONSE);
        assert_eq!(message.status, MessageStatus::Completed);
    }

    // ── Title generation ──

    #[tokio::test(start_paused = true)]
    async fn sentinel_title_is_generated_and_trimmed() {
        let h = harness(vec![
            text_turn("  Build a todo app  "),
            text_turn("Done."),
        ]);
        let event = seeded_event(&h, DEFAULT_CONVERSATION_TITLE, "build a todo app").await;

        run_to_completion(&h.deps, &h.registry, &event).await.unwrap();
        assert_eq!(h.model.calls(), 2);
        let conversation = h.store.conversation(&event.conversation_id).unwrap();
        assert_eq!(conversation.title, "Build a todo app");

        // The title request must not expose the tool catalogue.
        assert!(h.model.requests()[0].tools.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_title_response_keeps_sentinel() {
        let h = harness(vec![text_turn("   "), text_turn("Done.")]);
        let event = seeded_event(&h, DEFAULT_CONVERSATION_TITLE, "build a todo app").await;

        run_to_completion(&h.deps, &h.registry, &event).await.unwrap();
        let conversation = h.store.conversation(&event.conversation_id).unwrap();
        assert_eq!(conversation.title, DEFAULT_CONVERSATION_TITLE);
    }

    #[tokio::test(start_paused = true)]
    async fn non_sentinel_title_issues_no_title_request() {
        let h = harness(vec![text_turn("Done.")]);
        let event = seeded_event(&h, "Todo app", "one more thing").await;

        run_to_completion(&h.deps, &h.registry, &event).await.unwrap();
        // Exactly one model call: the coding turn.
        assert_eq!(h.model.calls(), 1);
        let conversation = h.store.conversation(&event.conversation_id).unwrap();
        assert_eq!(conversation.title, "Todo app");
    }

    // ── Context window ──

    #[tokio::test(start_paused = true)]
    async fn prior_turns_enter_the_system_prompt_filtered() {
        let h = harness(vec![text_turn("Done.")]);
        let conversation = h.store.seed_conversation("project-1", "Todo app");

        // A completed earlier exchange.
        let first = enqueue_message(&h.deps, &conversation.id, "add a navbar").await.unwrap();
        h.deps
            .store
            .update_message_content(KEY, &first.message_id, "Added Navbar.tsx")
            .await
            .unwrap();

        let event = enqueue_message(&h.deps, &conversation.id, "now style it").await.unwrap();
        run_to_completion(&h.deps, &h.registry, &event).await.unwrap();

        let system = &h.model.requests()[0].system;
        assert!(system.contains("USER: add a navbar"));
        assert!(system.contains("ASSISTANT: Added Navbar.tsx"));
        // The empty in-flight placeholder never reaches the prompt.
        assert!(!system.contains("ASSISTANT: \n"));
    }

    // ── Cancellation ──

    struct CancellingModel {
        registry: Arc<CancelRegistry>,
        message_id: std::sync::Mutex<String>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ModelClient for CancellingModel {
        async fn complete(&self, _request: &ModelRequest) -> Result<ModelTurn, StepError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(tool_turn("listFiles", serde_json::json!({})))
            } else {
                // The cancellation event lands while this turn is in flight;
                // the turn still completes, the next step never starts.
                self.registry.cancel(&self.message_id.lock().unwrap());
                Ok(text_turn("finished anyway"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_before_final_persist_writes_nothing() {
        let store = Arc::new(MemoryStore::new(KEY));
        let registry = Arc::new(CancelRegistry::new());
        let model = Arc::new(CancellingModel {
            registry: registry.clone(),
            message_id: std::sync::Mutex::new(String::new()),
            calls: AtomicUsize::new(0),
        });
        let deps = EngineDeps {
            config: EngineConfig::default().with_internal_key(KEY),
            store: store.clone(),
            model: model.clone(),
            fetcher: Arc::new(NullFetcher),
        };

        let conversation = store.seed_conversation("project-1", "Todo app");
        let event = enqueue_message(&deps, &conversation.id, "add a navbar").await.unwrap();
        *model.message_id.lock().unwrap() = event.message_id.clone();

        let result = run_to_completion(&deps, &registry, &event).await;
        assert!(matches!(result, Err(RunError::Cancelled)));

        let message = store.message(&event.message_id).unwrap();
        assert_eq!(message.content, "");
        assert_eq!(message.status, MessageStatus::Processing);
        assert_eq!(store.content_write_count(&event.message_id), 0);
    }
}
