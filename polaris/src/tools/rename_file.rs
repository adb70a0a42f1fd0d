use crate::error::RunError;
use crate::{ToolDefinition, ToolParam};

use super::{ProjectTool, ToolCtx, require_str};

/// Rename a file or folder by id.
pub struct RenameFile;

#[async_trait::async_trait]
impl ProjectTool for RenameFile {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "renameFile".into(),
            description: "Rename an existing file or folder".into(),
            params: vec![
                ToolParam::typed("fileId", "string")
                    .describe("The ID of the file or folder to rename"),
                ToolParam::typed("name", "string").describe("The new name"),
            ],
        }
    }

    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError> {
        let file_id = match require_str(args, "fileId") {
            Ok(id) => id.to_string(),
            Err(report) => return Ok(report),
        };
        let name = match require_str(args, "name") {
            Ok(name) => name.to_string(),
            Err(report) => return Ok(report),
        };

        ctx.step
            .run(&ctx.step_name("renameFile"), || async {
                // The model's view of the tree is a snapshot from an earlier
                // turn; re-check the id right before mutating.
                let Some(node) = ctx.store().get_node(ctx.key(), &file_id).await? else {
                    return Ok(format!(
                        "Error: No file or folder with ID \"{file_id}\". Use listFiles to \
                         get valid IDs."
                    ));
                };

                ctx.store().rename_node(ctx.key(), &file_id, &name).await?;
                Ok(format!("Renamed \"{}\" to \"{name}\"", node.name))
            })
            .await
    }
}
