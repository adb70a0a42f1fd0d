//! Test doubles shared across module tests.

use std::sync::Mutex;

use crate::error::StepError;
use crate::model::{ModelClient, ModelRequest, ModelTurn, TurnItem};
use crate::tools::ContentFetcher;

pub(crate) fn text_turn(content: &str) -> ModelTurn {
    ModelTurn {
        items: vec![TurnItem::Text {
            content: content.to_string(),
        }],
    }
}

pub(crate) fn tool_turn(name: &str, args: serde_json::Value) -> ModelTurn {
    ModelTurn {
        items: vec![TurnItem::ToolCall {
            name: name.to_string(),
            args,
        }],
    }
}

/// Replays a fixed turn sequence and records every request it served.
pub(crate) struct ScriptedModel {
    script: Mutex<std::collections::VecDeque<ModelTurn>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelTurn, StepError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| StepError::non_retriable("scripted model ran out of turns"))
    }
}

/// Fetcher for tests that never touch the network.
pub(crate) struct NullFetcher;

#[async_trait::async_trait]
impl ContentFetcher for NullFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, String> {
        Err("offline".to_string())
    }
}
