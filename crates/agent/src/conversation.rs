use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Audio,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub bot_messages: usize,
    pub duration_ms: i64,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation export could not be serialized: {0}")]
    Export(#[source] serde_json::Error),
    #[error("conversation import rejected: {0}")]
    Import(#[source] serde_json::Error),
}

/// Ordered transcript of one chat session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
struct ConversationExport<'a> {
    #[serde(flatten)]
    conversation: &'a Conversation,
    stats: ConversationStats,
    exported_at: DateTime<Utc>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: format!("conv_{}", Uuid::new_v4().simple()),
            started_at: now,
            last_activity: now,
            messages: Vec::new(),
        }
    }

    pub fn add_message(
        &mut self,
        sender: Sender,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> String {
        let now = Utc::now();
        let message = Message {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            timestamp: now,
            sender,
            content: content.into(),
            kind,
        };
        let id = message.id.clone();
        self.messages.push(message);
        self.last_activity = now;
        id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_by_id(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn update_message(&mut self, id: &str, content: impl Into<String>) -> bool {
        let Some(message) = self.messages.iter_mut().find(|message| message.id == id) else {
            return false;
        };
        message.content = content.into();
        self.last_activity = Utc::now();
        true
    }

    pub fn delete_message(&mut self, id: &str) -> bool {
        let Some(index) = self.messages.iter().position(|message| message.id == id) else {
            return false;
        };
        self.messages.remove(index);
        self.last_activity = Utc::now();
        true
    }

    /// Drops the transcript and starts a new session.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn stats(&self) -> ConversationStats {
        let user_messages =
            self.messages.iter().filter(|message| message.sender == Sender::User).count();
        let bot_messages =
            self.messages.iter().filter(|message| message.sender == Sender::Bot).count();
        ConversationStats {
            total_messages: self.messages.len(),
            user_messages,
            bot_messages,
            duration_ms: (Utc::now() - self.started_at).num_milliseconds(),
            last_activity: self.last_activity,
        }
    }

    pub fn export_json(&self) -> Result<String, ConversationError> {
        let export =
            ConversationExport { conversation: self, stats: self.stats(), exported_at: Utc::now() };
        serde_json::to_string_pretty(&export).map_err(ConversationError::Export)
    }

    /// Replaces this transcript with an exported one. On error nothing changes.
    pub fn import_json(&mut self, raw: &str) -> Result<(), ConversationError> {
        let imported: Conversation = serde_json::from_str(raw).map_err(ConversationError::Import)?;
        *self = imported;
        Ok(())
    }

    pub fn default_export_filename(&self) -> String {
        format!("conversation_{}_{}.json", self.session_id, Utc::now().format("%Y-%m-%d"))
    }
}
