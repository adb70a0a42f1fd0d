use crate::error::RunError;
use crate::store::{NewNode, NodeKind};
use crate::{ToolDefinition, ToolParam};

use super::{ProjectTool, ToolCtx, check_parent_folder, optional_parent_id, require_str};

/// Create a file, optionally under an existing folder.
pub struct CreateFile;

#[async_trait::async_trait]
impl ProjectTool for CreateFile {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "createFile".into(),
            description: "Create a new file in the project".into(),
            params: vec![
                ToolParam::typed("name", "string").describe("The name of the file to create"),
                ToolParam::optional("content", "string")
                    .describe("The initial content of the file"),
                ToolParam::optional("parentId", "string").describe(
                    "The ID (not name!) of the parent folder from listFiles, or empty \
                     string for root level",
                ),
            ],
        }
    }

    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError> {
        let name = match require_str(args, "name") {
            Ok(name) => name.to_string(),
            Err(report) => return Ok(report),
        };
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let parent_id = optional_parent_id(args);

        ctx.step
            .run(&ctx.step_name("createFile"), || async {
                if let Some(parent_id) = &parent_id
                    && let Some(report) =
                        check_parent_folder(ctx.store(), ctx.key(), ctx.project_id(), parent_id)
                            .await?
                {
                    return Ok(report);
                }

                let id = ctx
                    .store()
                    .create_node(
                        ctx.key(),
                        NewNode {
                            project_id: ctx.project_id().to_string(),
                            parent_id: parent_id.clone(),
                            name: name.clone(),
                            kind: NodeKind::File,
                            content: Some(content.clone()),
                        },
                    )
                    .await?;
                Ok(format!("File created with ID: {id}"))
            })
            .await
    }
}
