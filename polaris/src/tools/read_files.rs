use crate::error::RunError;
use crate::store::NodeKind;
use crate::{ToolDefinition, ToolParam};

use super::{ProjectTool, ToolCtx, require_str_list};

/// Batch file read. Folders and content-less files are skipped.
pub struct ReadFiles;

#[async_trait::async_trait]
impl ProjectTool for ReadFiles {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "readFiles".into(),
            description: "Read the content of files from the project. Returns file contents."
                .into(),
            params: vec![
                ToolParam::typed("fileIds", "array").describe("Array of file IDs to read"),
            ],
        }
    }

    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError> {
        let file_ids = match require_str_list(args, "fileIds") {
            Ok(ids) => ids,
            Err(report) => return Ok(report),
        };

        ctx.step
            .run(&ctx.step_name("readFiles"), || async {
                let mut results: Vec<serde_json::Value> = Vec::new();
                for file_id in &file_ids {
                    let node = ctx.store().get_node(ctx.key(), file_id).await?;
                    // Skip folders and files without inline content.
                    if let Some(node) = node
                        && node.kind == NodeKind::File
                        && let Some(content) = node.content
                    {
                        results.push(serde_json::json!({
                            "id": node.id,
                            "name": node.name,
                            "content": content,
                        }));
                    }
                }

                if results.is_empty() {
                    return Ok("Error: No files found with provided IDs. Use listFiles to \
                               get valid file IDs."
                        .to_string());
                }
                Ok(serde_json::Value::Array(results).to_string())
            })
            .await
    }
}
