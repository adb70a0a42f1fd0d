use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Processing,
    Completed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub project_id: String,
    pub title: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub project_id: String,
    pub role: MessageRole,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// One node of a project's virtual file tree. `parent_id == None` is the
/// project root; folders never carry content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VfsNode {
    pub id: String,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Fields for a message insert.
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub conversation_id: String,
    pub project_id: String,
    pub role: MessageRole,
    pub content: String,
    pub status: MessageStatus,
}

/// Fields for a file-tree insert.
#[derive(Clone, Debug)]
pub struct NewNode {
    pub project_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: NodeKind,
    pub content: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store call rejected: invalid internal key")]
    Unauthorized,
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Contract for the managed document store.
///
/// Every call carries the shared credential; the store rejects calls that
/// lack it. Fetch-by-id returns `Ok(None)` for a well-formed absent id,
/// never an error.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_conversation(
        &self,
        key: &str,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, StoreError>;

    /// The most recent messages of a conversation, newest first.
    async fn recent_messages(
        &self,
        key: &str,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    async fn create_message(&self, key: &str, message: NewMessage) -> Result<String, StoreError>;

    /// The single terminal write for a processing message: sets content and
    /// flips status to `Completed` in one operation.
    async fn update_message_content(
        &self,
        key: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), StoreError>;

    async fn update_conversation_title(
        &self,
        key: &str,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), StoreError>;

    async fn get_node(&self, key: &str, node_id: &str) -> Result<Option<VfsNode>, StoreError>;

    async fn list_nodes(&self, key: &str, project_id: &str) -> Result<Vec<VfsNode>, StoreError>;

    async fn create_node(&self, key: &str, node: NewNode) -> Result<String, StoreError>;

    async fn update_file_content(
        &self,
        key: &str,
        node_id: &str,
        content: &str,
    ) -> Result<(), StoreError>;

    async fn rename_node(&self, key: &str, node_id: &str, name: &str) -> Result<(), StoreError>;

    async fn delete_node(&self, key: &str, node_id: &str) -> Result<(), StoreError>;
}

// ─── In-memory implementation ───

#[derive(Default)]
struct Inner {
    conversations: HashMap<String, Conversation>,
    /// Creation order preserved; recency queries scan from the back.
    messages: Vec<MessageRecord>,
    nodes: HashMap<String, VfsNode>,
    /// Log of terminal content writes, by message id.
    content_writes: Vec<String>,
}

/// In-memory document store. A single `Mutex` serializes all access.
///
/// Used by tests and local runs; production deployments point the engine at
/// the managed store behind the same trait.
pub struct MemoryStore {
    key: String,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(internal_key: impl Into<String>) -> Self {
        Self {
            key: internal_key.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn check_key(&self, key: &str) -> Result<(), StoreError> {
        if key == self.key {
            Ok(())
        } else {
            Err(StoreError::Unauthorized)
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    /// Seed a conversation directly (no credential; host-side setup).
    pub fn seed_conversation(&self, project_id: &str, title: &str) -> Conversation {
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            title: title.to_string(),
        };
        self.lock()
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        conversation
    }

    /// Seed a file-tree node directly; returns its id.
    pub fn seed_node(&self, node: NewNode) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.lock().nodes.insert(
            id.clone(),
            VfsNode {
                id: id.clone(),
                project_id: node.project_id,
                parent_id: node.parent_id,
                name: node.name,
                kind: node.kind,
                content: node.content,
            },
        );
        id
    }

    /// Direct message lookup (host-side inspection).
    pub fn message(&self, message_id: &str) -> Option<MessageRecord> {
        self.lock()
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    /// Direct node lookup (host-side inspection).
    pub fn node(&self, node_id: &str) -> Option<VfsNode> {
        self.lock().nodes.get(node_id).cloned()
    }

    /// Direct conversation lookup (host-side inspection).
    pub fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.lock().conversations.get(conversation_id).cloned()
    }

    /// How many terminal content writes a message has received.
    pub fn content_write_count(&self, message_id: &str) -> usize {
        self.lock()
            .content_writes
            .iter()
            .filter(|id| id.as_str() == message_id)
            .count()
    }

    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get_conversation(
        &self,
        key: &str,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        self.check_key(key)?;
        Ok(self.lock().conversations.get(conversation_id).cloned())
    }

    async fn recent_messages(
        &self,
        key: &str,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        self.check_key(key)?;
        let inner = self.lock();
        Ok(inner
            .messages
            .iter()
            .rev()
            .filter(|m| m.conversation_id == conversation_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_message(&self, key: &str, message: NewMessage) -> Result<String, StoreError> {
        self.check_key(key)?;
        let id = uuid::Uuid::new_v4().to_string();
        self.lock().messages.push(MessageRecord {
            id: id.clone(),
            conversation_id: message.conversation_id,
            project_id: message.project_id,
            role: message.role,
            content: message.content,
            status: message.status,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_message_content(
        &self,
        key: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        self.check_key(key)?;
        let mut inner = self.lock();
        let Some(message) = inner.messages.iter_mut().find(|m| m.id == message_id) else {
            return Err(StoreError::Backend(format!(
                "message not found: {message_id}"
            )));
        };
        message.content = content.to_string();
        message.status = MessageStatus::Completed;
        inner.content_writes.push(message_id.to_string());
        Ok(())
    }

    async fn update_conversation_title(
        &self,
        key: &str,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), StoreError> {
        self.check_key(key)?;
        let mut inner = self.lock();
        let Some(conversation) = inner.conversations.get_mut(conversation_id) else {
            return Err(StoreError::Backend(format!(
                "conversation not found: {conversation_id}"
            )));
        };
        conversation.title = title.to_string();
        Ok(())
    }

    async fn get_node(&self, key: &str, node_id: &str) -> Result<Option<VfsNode>, StoreError> {
        self.check_key(key)?;
        Ok(self.lock().nodes.get(node_id).cloned())
    }

    async fn list_nodes(&self, key: &str, project_id: &str) -> Result<Vec<VfsNode>, StoreError> {
        self.check_key(key)?;
        let inner = self.lock();
        let mut nodes: Vec<VfsNode> = inner
            .nodes
            .values()
            .filter(|n| n.project_id == project_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    async fn create_node(&self, key: &str, node: NewNode) -> Result<String, StoreError> {
        self.check_key(key)?;
        Ok(self.seed_node(node))
    }

    async fn update_file_content(
        &self,
        key: &str,
        node_id: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        self.check_key(key)?;
        let mut inner = self.lock();
        let Some(node) = inner.nodes.get_mut(node_id) else {
            return Err(StoreError::Backend(format!("node not found: {node_id}")));
        };
        node.content = Some(content.to_string());
        Ok(())
    }

    async fn rename_node(&self, key: &str, node_id: &str, name: &str) -> Result<(), StoreError> {
        self.check_key(key)?;
        let mut inner = self.lock();
        let Some(node) = inner.nodes.get_mut(node_id) else {
            return Err(StoreError::Backend(format!("node not found: {node_id}")));
        };
        node.name = name.to_string();
        Ok(())
    }

    async fn delete_node(&self, key: &str, node_id: &str) -> Result<(), StoreError> {
        self.check_key(key)?;
        let mut inner = self.lock();
        if inner.nodes.remove(node_id).is_none() {
            return Err(StoreError::Backend(format!("node not found: {node_id}")));
        }
        Ok(())
    }
}
