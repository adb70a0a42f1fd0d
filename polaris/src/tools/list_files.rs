use crate::error::RunError;
use crate::store::NodeKind;
use crate::{ToolDefinition, ToolParam};

use super::{ProjectTool, ToolCtx, optional_parent_id};

/// Enumerate the project's file tree so the model can work from real IDs.
pub struct ListFiles;

#[async_trait::async_trait]
impl ProjectTool for ListFiles {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "listFiles".into(),
            description: "List all files and folders in the project with their IDs. \
                          Call this before any other file tool."
                .into(),
            params: vec![ToolParam::optional("parentId", "string").describe(
                "Restrict the listing to the direct children of this folder ID. \
                 Omit or pass an empty string for the whole project.",
            )],
        }
    }

    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError> {
        let parent_id = optional_parent_id(args);

        ctx.step
            .run(&ctx.step_name("listFiles"), || async {
                if let Some(parent_id) = &parent_id {
                    match ctx.store().get_node(ctx.key(), parent_id).await? {
                        None => {
                            return Ok(format!(
                                "Error: Parent folder with ID \"{parent_id}\" not found. \
                                 Use listFiles without parentId to see the whole project."
                            ));
                        }
                        Some(node) if node.project_id != ctx.project_id() => {
                            return Ok(format!(
                                "Error: Parent folder with ID \"{parent_id}\" not found. \
                                 Use listFiles without parentId to see the whole project."
                            ));
                        }
                        Some(node) if node.kind != NodeKind::Folder => {
                            return Ok(format!(
                                "Error: The ID \"{parent_id}\" is a file, not a folder."
                            ));
                        }
                        Some(_) => {}
                    }
                }

                let nodes = ctx.store().list_nodes(ctx.key(), ctx.project_id()).await?;
                let listed: Vec<serde_json::Value> = nodes
                    .iter()
                    .filter(|n| match &parent_id {
                        None => true,
                        Some(p) => n.parent_id.as_deref() == Some(p.as_str()),
                    })
                    .map(|n| {
                        serde_json::json!({
                            "id": n.id,
                            "name": n.name,
                            "type": match n.kind {
                                NodeKind::File => "file",
                                NodeKind::Folder => "folder",
                            },
                            "parentId": n.parent_id,
                        })
                    })
                    .collect();

                // An empty project is an empty listing, not an error.
                Ok(serde_json::Value::Array(listed).to_string())
            })
            .await
    }
}
