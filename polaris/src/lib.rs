pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod prompts;
pub mod router;
pub mod store;
pub mod tools;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use agent::{AgentDef, Network, NetworkRun};
pub use config::EngineConfig;
pub use engine::{CancelRegistry, StepContext};
pub use error::{RunError, StepError};
pub use model::{
    ContextEntry, GeminiClient, GenerationParams, ModelClient, ModelRequest, ModelTurn, TurnItem,
};
pub use store::{
    Conversation, DocumentStore, MemoryStore, MessageRecord, MessageRole, MessageStatus,
    NewMessage, NewNode, NodeKind, StoreError, VfsNode,
};
pub use tools::{ContentFetcher, HttpFetcher, ProjectTool, ToolCtx, ToolEnv};
pub use workflow::{EngineDeps, MessageEvent, RunSummary};

/// A typed parameter for a tool definition.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ToolParam {
    pub name: String,
    /// JSON schema type: "string", "number", "boolean", "array", "object"
    pub r#type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "ToolParam::default_required")]
    pub required: bool,
}

impl ToolParam {
    fn default_required() -> bool {
        true
    }

    pub fn typed(name: &str, ty: &str) -> Self {
        Self {
            name: name.into(),
            r#type: ty.into(),
            description: String::new(),
            required: true,
        }
    }

    pub fn optional(name: &str, ty: &str) -> Self {
        Self {
            name: name.into(),
            r#type: ty.into(),
            description: String::new(),
            required: false,
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.into();
        self
    }
}

/// A tool definition exposed to the model.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ToolParam>,
}

impl ToolDefinition {
    /// Encode as a function declaration for the model service.
    ///
    /// Array parameters are always string arrays in this catalogue, so the
    /// item schema is fixed rather than carried on `ToolParam`.
    pub fn to_function_declaration(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required: Vec<&str> = Vec::new();
        for p in &self.params {
            let mut schema = serde_json::Map::new();
            schema.insert("type".into(), serde_json::json!(p.r#type));
            if !p.description.is_empty() {
                schema.insert("description".into(), serde_json::json!(p.description));
            }
            if p.r#type == "array" {
                schema.insert("items".into(), serde_json::json!({"type": "string"}));
            }
            properties.insert(p.name.clone(), serde_json::Value::Object(schema));
            if p.required {
                required.push(&p.name);
            }
        }
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── ToolParam ──

    #[test]
    fn tool_param_typed() {
        let p = ToolParam::typed("name", "string");
        assert_eq!(p.name, "name");
        assert_eq!(p.r#type, "string");
        assert!(p.required);
    }

    #[test]
    fn tool_param_optional() {
        let p = ToolParam::optional("parentId", "string");
        assert!(!p.required);
    }

    // ── to_function_declaration ──

    #[test]
    fn function_declaration_required_and_optional() {
        let td = ToolDefinition {
            name: "createFile".into(),
            description: "Create a file".into(),
            params: vec![
                ToolParam::typed("name", "string").describe("The file name"),
                ToolParam::optional("parentId", "string"),
            ],
        };
        let decl = td.to_function_declaration();
        assert_eq!(decl["name"], "createFile");
        assert_eq!(
            decl["parameters"]["properties"]["name"]["description"],
            "The file name"
        );
        assert_eq!(decl["parameters"]["required"], serde_json::json!(["name"]));
    }

    #[test]
    fn function_declaration_array_items() {
        let td = ToolDefinition {
            name: "readFiles".into(),
            description: "Read files".into(),
            params: vec![ToolParam::typed("fileIds", "array")],
        };
        let decl = td.to_function_declaration();
        assert_eq!(
            decl["parameters"]["properties"]["fileIds"]["items"]["type"],
            "string"
        );
    }
}
