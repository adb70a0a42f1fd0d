use crate::error::RunError;
use crate::store::NodeKind;
use crate::{ToolDefinition, ToolParam};

use super::{ProjectTool, ToolCtx, require_str};

/// Replace the content of an existing file.
pub struct UpdateFile;

#[async_trait::async_trait]
impl ProjectTool for UpdateFile {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "updateFile".into(),
            description: "Update the content of an existing file".into(),
            params: vec![
                ToolParam::typed("fileId", "string").describe("The ID of the file to update"),
                ToolParam::typed("content", "string").describe("The new content for the file"),
            ],
        }
    }

    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError> {
        let file_id = match require_str(args, "fileId") {
            Ok(id) => id.to_string(),
            Err(report) => return Ok(report),
        };
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        ctx.step
            .run(&ctx.step_name("updateFile"), || async {
                let Some(node) = ctx.store().get_node(ctx.key(), &file_id).await? else {
                    return Ok(format!(
                        "Error: File with ID \"{file_id}\" not found. Use listFiles to get \
                         valid file IDs."
                    ));
                };
                if node.kind == NodeKind::Folder {
                    return Ok(format!(
                        "Error: \"{file_id}\" is a folder, not a file. You can only update \
                         file contents."
                    ));
                }

                ctx.store()
                    .update_file_content(ctx.key(), &file_id, &content)
                    .await?;
                Ok(format!("File \"{}\" updated successfully", node.name))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewNode;
    use crate::tools::test_support::{PROJECT, ToolHarness};

    fn seed_file(harness: &ToolHarness, name: &str, content: &str) -> String {
        harness.store.seed_node(NewNode {
            project_id: PROJECT.into(),
            parent_id: None,
            name: name.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
        })
    }

    #[tokio::test]
    async fn replaces_content() {
        let harness = ToolHarness::new();
        let id = seed_file(&harness, "app.ts", "old");
        let result = harness
            .call(
                &UpdateFile,
                serde_json::json!({"fileId": id, "content": "new"}),
                "0-0",
            )
            .await;
        assert_eq!(result, "File \"app.ts\" updated successfully");
        assert_eq!(harness.store.node(&id).unwrap().content.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn missing_file_reports_offending_id() {
        let harness = ToolHarness::new();
        let result = harness
            .call(
                &UpdateFile,
                serde_json::json!({"fileId": "ghost", "content": "x"}),
                "0-0",
            )
            .await;
        assert!(result.starts_with("Error:"));
        assert!(result.contains("ghost"));
    }

    #[tokio::test]
    async fn folder_target_is_rejected_without_mutation() {
        let harness = ToolHarness::new();
        let folder_id = harness.store.seed_node(NewNode {
            project_id: PROJECT.into(),
            parent_id: None,
            name: "src".into(),
            kind: NodeKind::Folder,
            content: None,
        });
        let result = harness
            .call(
                &UpdateFile,
                serde_json::json!({"fileId": folder_id, "content": "x"}),
                "0-0",
            )
            .await;
        assert!(result.contains("is a folder, not a file"));
        assert!(harness.store.node(&folder_id).unwrap().content.is_none());
    }
}
