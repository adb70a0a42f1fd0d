use crate::error::RunError;
use crate::{ToolDefinition, ToolParam};

use super::{ProjectTool, ToolCtx, require_str_list};

/// Batch delete by id, re-validating each id immediately before mutating.
pub struct DeleteFiles;

#[async_trait::async_trait]
impl ProjectTool for DeleteFiles {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "deleteFiles".into(),
            description: "Delete files or folders from the project".into(),
            params: vec![
                ToolParam::typed("fileIds", "array")
                    .describe("Array of file or folder IDs to delete"),
            ],
        }
    }

    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError> {
        let file_ids = match require_str_list(args, "fileIds") {
            Ok(ids) => ids,
            Err(report) => return Ok(report),
        };

        ctx.step
            .run(&ctx.step_name("deleteFiles"), || async {
                let mut deleted: Vec<String> = Vec::new();
                let mut failures: Vec<String> = Vec::new();
                for file_id in &file_ids {
                    // Ids may have gone stale since the model last listed.
                    match ctx.store().get_node(ctx.key(), file_id).await? {
                        None => failures.push(format!("No file or folder with ID \"{file_id}\"")),
                        Some(node) => {
                            ctx.store().delete_node(ctx.key(), file_id).await?;
                            deleted.push(node.name);
                        }
                    }
                }

                if deleted.is_empty() {
                    return Ok("Error: No files or folders found with provided IDs. Use \
                               listFiles to get valid IDs."
                        .to_string());
                }
                let mut report = format!("Deleted: {}", deleted.join(", "));
                if !failures.is_empty() {
                    report.push_str("\nErrors:\n- ");
                    report.push_str(&failures.join("\n- "));
                }
                Ok(report)
            })
            .await
    }
}
