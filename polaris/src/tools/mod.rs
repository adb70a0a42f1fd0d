mod create_file;
mod create_folder;
mod delete_files;
mod list_files;
mod read_files;
mod rename_file;
mod scrape_urls;
mod update_file;

pub use create_file::CreateFile;
pub use create_folder::CreateFolder;
pub use delete_files::DeleteFiles;
pub use list_files::ListFiles;
pub use read_files::ReadFiles;
pub use rename_file::RenameFile;
pub use scrape_urls::{ContentFetcher, HttpFetcher, ScrapeUrls};
pub use update_file::UpdateFile;

use std::sync::Arc;

use crate::ToolDefinition;
use crate::engine::StepContext;
use crate::error::RunError;
use crate::store::DocumentStore;

/// Run-scoped environment every tool invocation is closed over.
pub struct ToolEnv<'a> {
    pub store: &'a dyn DocumentStore,
    pub fetcher: &'a dyn ContentFetcher,
    pub internal_key: &'a str,
    pub project_id: &'a str,
}

/// One tool invocation's context: the environment, the durable step scope,
/// and a label making this invocation's step names unique within the run.
pub struct ToolCtx<'a> {
    pub env: &'a ToolEnv<'a>,
    pub step: &'a StepContext,
    pub step_label: String,
}

impl ToolCtx<'_> {
    pub fn store(&self) -> &dyn DocumentStore {
        self.env.store
    }

    pub fn key(&self) -> &str {
        self.env.internal_key
    }

    pub fn project_id(&self) -> &str {
        self.env.project_id
    }

    /// Durable step name for this invocation's single store/network call.
    pub fn step_name(&self, tool: &str) -> String {
        format!("tool-{tool}-{}", self.step_label)
    }
}

/// A model-invocable operation against the virtual project tree.
///
/// Each tool is a validate → resolve → act → report unit. The returned
/// string is fed straight back to the model: success payloads are terse and
/// stable, faults are rendered as descriptive `Error:` strings and never
/// raised. Only engine-level aborts (cancellation, retry exhaustion on the
/// underlying store call) propagate as `RunError`.
#[async_trait::async_trait]
pub trait ProjectTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError>;
}

/// The tool set bound to a coding-agent run.
pub fn catalogue() -> Vec<Arc<dyn ProjectTool>> {
    vec![
        Arc::new(ListFiles),
        Arc::new(ReadFiles),
        Arc::new(UpdateFile),
        Arc::new(CreateFile),
        Arc::new(CreateFolder),
        Arc::new(RenameFile),
        Arc::new(DeleteFiles),
        Arc::new(ScrapeUrls),
    ]
}

/// Extract a required non-empty string arg, or report.
pub(crate) fn require_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Error: \"{key}\" is required and must be a non-empty string."))
}

/// Extract a required non-empty array of non-empty strings, or report.
pub(crate) fn require_str_list(args: &serde_json::Value, key: &str) -> Result<Vec<String>, String> {
    let Some(values) = args.get(key).and_then(|v| v.as_array()) else {
        return Err(format!(
            "Error: \"{key}\" is required and must be an array of strings."
        ));
    };
    let mut items = Vec::with_capacity(values.len());
    for value in values {
        match value.as_str().filter(|s| !s.is_empty()) {
            Some(item) => items.push(item.to_string()),
            None => return Err(format!("Error: \"{key}\" must contain non-empty strings.")),
        }
    }
    if items.is_empty() {
        return Err(format!("Error: provide at least one value in \"{key}\"."));
    }
    Ok(items)
}

/// Check that a supplied parent id resolves to a folder in this project.
///
/// `Ok(Some(report))` is the rendered fault for the model; `Ok(None)` means
/// the parent is valid. A node from another project counts as not found.
/// Store faults propagate for the engine to retry.
pub(crate) async fn check_parent_folder(
    store: &dyn DocumentStore,
    key: &str,
    project_id: &str,
    parent_id: &str,
) -> Result<Option<String>, crate::error::StepError> {
    let node = match store.get_node(key, parent_id).await? {
        Some(node) if node.project_id == project_id => node,
        _ => {
            return Ok(Some(format!(
                "Error: Parent folder with ID \"{parent_id}\" not found. Use listFiles to \
                 get valid folder IDs, or use an empty string for root level."
            )));
        }
    };
    if node.kind != crate::store::NodeKind::Folder {
        return Ok(Some(format!(
            "Error: The ID \"{parent_id}\" is a file, not a folder. Use a folder ID as parentId."
        )));
    }
    Ok(None)
}

/// Optional parent id where an empty string means the project root, same as
/// leaving it unspecified.
pub(crate) fn optional_parent_id(args: &serde_json::Value) -> Option<String> {
    args.get("parentId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
