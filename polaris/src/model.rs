use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ToolDefinition;
use crate::error::StepError;

/// Sampling parameters for one model call.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// One item of a model turn: prose, or a requested tool invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnItem {
    Text { content: String },
    ToolCall { name: String, args: serde_json::Value },
}

/// A single request/response exchange with the model.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelTurn {
    pub items: Vec<TurnItem>,
}

impl ModelTurn {
    pub fn has_tool_calls(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, TurnItem::ToolCall { .. }))
    }

    /// Concatenated text items, or `None` when the turn produced no prose.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .items
            .iter()
            .filter_map(|item| match item {
                TurnItem::Text { content } => Some(content.as_str()),
                TurnItem::ToolCall { .. } => None,
            })
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    pub fn tool_calls(&self) -> Vec<(&str, &serde_json::Value)> {
        self.items
            .iter()
            .filter_map(|item| match item {
                TurnItem::ToolCall { name, args } => Some((name.as_str(), args)),
                TurnItem::Text { .. } => None,
            })
            .collect()
    }
}

/// Conversation context fed back into the model across turns of one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ContextEntry {
    User(String),
    Assistant(ModelTurn),
    ToolResult { name: String, output: String },
}

/// One inference request: system prompt, accumulated context, tool
/// catalogue, and sampling parameters.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub model: String,
    pub system: String,
    pub context: Vec<ContextEntry>,
    pub tools: Vec<ToolDefinition>,
    pub params: GenerationParams,
}

/// Contract for the hosted inference service.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelTurn, StepError>;
}

// ─── Gemini REST client ───

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Wall-clock bound on one inference round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// `ModelClient` over the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn build_body(request: &ModelRequest) -> serde_json::Value {
    let mut contents: Vec<serde_json::Value> = Vec::new();
    for entry in &request.context {
        match entry {
            ContextEntry::User(text) => {
                contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{"text": text}],
                }));
            }
            ContextEntry::Assistant(turn) => {
                let parts: Vec<serde_json::Value> = turn
                    .items
                    .iter()
                    .map(|item| match item {
                        TurnItem::Text { content } => serde_json::json!({"text": content}),
                        TurnItem::ToolCall { name, args } => {
                            serde_json::json!({"functionCall": {"name": name, "args": args}})
                        }
                    })
                    .collect();
                contents.push(serde_json::json!({"role": "model", "parts": parts}));
            }
            ContextEntry::ToolResult { name, output } => {
                contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": name,
                            "response": {"result": output},
                        },
                    }],
                }));
            }
        }
    }

    let mut body = serde_json::json!({
        "system_instruction": {"parts": [{"text": request.system}]},
        "contents": contents,
        "generationConfig": {
            "temperature": request.params.temperature,
            "maxOutputTokens": request.params.max_output_tokens,
        },
    });
    if !request.tools.is_empty() {
        let declarations: Vec<serde_json::Value> = request
            .tools
            .iter()
            .map(|t| t.to_function_declaration())
            .collect();
        body["tools"] = serde_json::json!([{"functionDeclarations": declarations}]);
    }
    body
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

fn parse_turn(response: GenerateContentResponse) -> Result<ModelTurn, StepError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(StepError::retriable("model returned no candidates"));
    };
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut items = Vec::new();
    for part in parts {
        if let Some(text) = part.text
            && !text.is_empty()
        {
            items.push(TurnItem::Text { content: text });
        }
        if let Some(call) = part.function_call {
            let args = if call.args.is_null() {
                serde_json::json!({})
            } else {
                call.args
            };
            items.push(TurnItem::ToolCall {
                name: call.name,
                args,
            });
        }
    }
    Ok(ModelTurn { items })
}

/// Rate limits and server-side trouble are worth retrying; everything else
/// (bad request, invalid key) is not.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

#[async_trait::async_trait]
impl ModelClient for GeminiClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelTurn, StepError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        let body = build_body(request);

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                StepError::retriable(format!("model request failed: {e}"))
            } else {
                StepError::non_retriable(format!("model request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("model service returned {status}: {detail}");
            return if is_retryable_status(status) {
                Err(StepError::retriable(message))
            } else {
                Err(StepError::non_retriable(message))
            };
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| StepError::non_retriable(format!("malformed model response: {e}")))?;
        parse_turn(parsed)
    }
}
