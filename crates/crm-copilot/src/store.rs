//! Conversation store: message history, saved favorites, and the cross-turn
//! context map.
//!
//! The store is a plain value owned by the pipeline's caller and passed in
//! explicitly, with no ambient global. Messages are append-only and immutable
//! once pushed; favorites are created only by the `favorite` action and
//! removed by explicit user request; the context map is shallow-merged on
//! each update and consumed opportunistically by the response generator.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    /// The original user text that was saved.
    pub query: String,
    pub description: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationStore {
    messages: Vec<ChatMessage>,
    favorites: Vec<Favorite>,
    #[serde(default)]
    context: Map<String, Value>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Messages ───────────────────────────────────────────────────────────

    pub fn add_message(&mut self, role: ChatRole, content: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        });
        self.messages.last().expect("just pushed")
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    // ── Favorites ──────────────────────────────────────────────────────────

    pub fn add_favorite(
        &mut self,
        query: impl Into<String>,
        description: impl Into<String>,
    ) -> &Favorite {
        self.favorites.push(Favorite {
            id: Uuid::new_v4(),
            query: query.into(),
            description: description.into(),
            timestamp: Utc::now().timestamp_millis(),
        });
        self.favorites.last().expect("just pushed")
    }

    /// Returns true when a favorite with that id existed and was removed.
    pub fn remove_favorite(&mut self, id: Uuid) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|f| f.id != id);
        self.favorites.len() != before
    }

    pub fn favorites(&self) -> &[Favorite] {
        &self.favorites
    }

    // ── Context ────────────────────────────────────────────────────────────

    /// Shallow-merge `updates` into the context map. Later values win.
    pub fn update_context(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            self.context.insert(key, value);
        }
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    // ── Persistence ────────────────────────────────────────────────────────

    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("crm-copilot").join("conversation.json"))
    }

    /// Load the store from `path`, or return an empty store when the file
    /// does not exist yet.
    pub fn load(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let store = serde_json::from_str(&content).context("Failed to parse store file")?;
        Ok(store)
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize store")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
