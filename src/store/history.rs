use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::credentials::keys;
use super::{KeyValueStore, StoreError};

/// Number of most recent entries kept.
pub const MAX_CHAT_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Conversation log owned by the caller and persisted after every change.
pub struct ConversationHistory {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<ChatEntry>,
}

impl ConversationHistory {
    /// Load the stored history. An unreadable entry list starts a fresh log.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let entries = match store.get(keys::CHAT_HISTORY).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(error = %err, "discarding unreadable chat history");
                Vec::new()
            }),
            None => Vec::new(),
        };
        Ok(Self { store, entries })
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Append a message and persist the most recent MAX_CHAT_HISTORY entries.
    pub async fn push(
        &mut self,
        role: Role,
        content: impl Into<String>,
        is_error: bool,
    ) -> Result<(), StoreError> {
        self.entries.push(ChatEntry {
            role,
            content: content.into(),
            is_error,
            timestamp: Utc::now().timestamp_millis(),
        });
        if self.entries.len() > MAX_CHAT_HISTORY {
            let excess = self.entries.len() - MAX_CHAT_HISTORY;
            self.entries.drain(..excess);
        }

        let value = serde_json::to_value(&self.entries)?;
        self.store.set(keys::CHAT_HISTORY, value).await
    }

    pub async fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        self.store.remove(keys::CHAT_HISTORY).await
    }
}
