use std::sync::Arc;

use crate::engine::StepContext;
use crate::error::RunError;
use crate::model::{ContextEntry, GenerationParams, ModelClient, ModelRequest, ModelTurn, TurnItem};
use crate::router::{self, RouterDecision};
use crate::tools::{ProjectTool, ToolCtx, ToolEnv};

/// An agent: system prompt, sampling parameters, and a tool catalogue.
pub struct AgentDef {
    pub name: String,
    pub model: String,
    pub system: String,
    pub params: GenerationParams,
    pub tools: Vec<Arc<dyn ProjectTool>>,
}

/// Completed turns of one network run.
#[derive(Debug)]
pub struct NetworkRun {
    pub turns: Vec<ModelTurn>,
    pub iterations: usize,
}

/// Single-agent network: issues model turns until the router stops or the
/// iteration cap forces a stop.
pub struct Network<'a> {
    pub agent: &'a AgentDef,
    pub model: &'a dyn ModelClient,
    pub max_iterations: usize,
}

impl Network<'_> {
    /// Run the agent loop to convergence.
    ///
    /// Every model call and every tool invocation is its own durable step;
    /// tool results are fed back into the context before the next turn.
    pub async fn run(
        &self,
        step: &StepContext,
        env: &ToolEnv<'_>,
        user_message: &str,
    ) -> Result<NetworkRun, RunError> {
        let definitions: Vec<_> = self.agent.tools.iter().map(|t| t.definition()).collect();
        let mut context = vec![ContextEntry::User(user_message.to_string())];
        let mut turns: Vec<ModelTurn> = Vec::new();

        while turns.len() < self.max_iterations
            && router::route(&turns) == RouterDecision::Continue
        {
            let iteration = turns.len();
            let request = ModelRequest {
                model: self.agent.model.clone(),
                system: self.agent.system.clone(),
                context: context.clone(),
                tools: definitions.clone(),
                params: self.agent.params,
            };
            let turn = step
                .run(&format!("{}-turn-{iteration}", self.agent.name), || async {
                    self.model.complete(&request).await
                })
                .await?;

            context.push(ContextEntry::Assistant(turn.clone()));

            for (call_index, item) in turn.items.iter().enumerate() {
                let TurnItem::ToolCall { name, args } = item else {
                    continue;
                };
                let output = match self.agent.tools.iter().find(|t| t.definition().name == *name)
                {
                    Some(tool) => {
                        let ctx = ToolCtx {
                            env,
                            step,
                            step_label: format!("{iteration}-{call_index}"),
                        };
                        tool.call(args, &ctx).await?
                    }
                    None => format!("Error: Unknown tool \"{name}\"."),
                };
                context.push(ContextEntry::ToolResult {
                    name: name.clone(),
                    output,
                });
            }

            turns.push(turn);
        }

        let iterations = turns.len();
        Ok(NetworkRun { turns, iterations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{NullFetcher, ScriptedModel, text_turn, tool_turn};
    use tokio_util::sync::CancellationToken;

    fn agent() -> AgentDef {
        AgentDef {
            name: "polaris".into(),
            model: "gemini-3.0-flash".into(),
            system: "system".into(),
            params: GenerationParams {
                temperature: 0.3,
                max_output_tokens: 16_000,
            },
            tools: crate::tools::catalogue(),
        }
    }

    async fn run_network(model: &ScriptedModel, max_iterations: usize) -> NetworkRun {
        let store = MemoryStore::new("test-key");
        let fetcher = NullFetcher;
        let env = ToolEnv {
            store: &store,
            fetcher: &fetcher,
            internal_key: "test-key",
            project_id: "project-1",
        };
        let step = StepContext::new(CancellationToken::new());
        let agent = agent();
        let network = Network {
            agent: &agent,
            model,
            max_iterations,
        };
        network.run(&step, &env, "build it").await.unwrap()
    }

    #[tokio::test]
    async fn stops_on_first_text_only_turn() {
        let model = ScriptedModel::new(vec![
            tool_turn("listFiles", serde_json::json!({})),
            tool_turn("listFiles", serde_json::json!({})),
            tool_turn("listFiles", serde_json::json!({})),
            text_turn("All set."),
        ]);
        let run = run_network(&model, 20).await;
        assert_eq!(run.iterations, 4);
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn cap_forces_stop() {
        let turns: Vec<_> = (0..20)
            .map(|_| tool_turn("listFiles", serde_json::json!({})))
            .collect();
        let model = ScriptedModel::new(turns);
        let run = run_network(&model, 20).await;
        assert_eq!(run.iterations, 20);
        assert_eq!(model.calls(), 20);
        assert_eq!(crate::router::final_text(&run.turns), None);
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let model = ScriptedModel::new(vec![
            tool_turn("listFiles", serde_json::json!({})),
            text_turn("done"),
        ]);
        run_network(&model, 20).await;
        let requests = model.requests();
        // Second request carries the assistant turn plus the tool result.
        let context = &requests[1].context;
        assert_eq!(context.len(), 3);
        assert!(matches!(&context[1], ContextEntry::Assistant(_)));
        match &context[2] {
            ContextEntry::ToolResult { name, output } => {
                assert_eq!(name, "listFiles");
                assert_eq!(output, "[]");
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_reports_to_the_model() {
        let model = ScriptedModel::new(vec![
            tool_turn("formatDisk", serde_json::json!({})),
            text_turn("done"),
        ]);
        run_network(&model, 20).await;
        let requests = model.requests();
        match &requests[1].context[2] {
            ContextEntry::ToolResult { output, .. } => {
                assert!(output.contains("Unknown tool"));
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }
}
