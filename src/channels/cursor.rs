//! Last-seen message cursors for incremental group fetches.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Storage for the newest message id seen per group.
///
/// Injected into the chat fetcher so multi-instance deployments can swap the
/// in-memory map for shared storage.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, group_id: &str) -> Option<String>;
    async fn set(&self, group_id: &str, message_id: &str);
    /// Forget the cursor for a group. Returns whether one existed.
    async fn clear(&self, group_id: &str) -> bool;
}

/// Process-local cursor store. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<String, String>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get(&self, group_id: &str) -> Option<String> {
        self.cursors.read().await.get(group_id).cloned()
    }

    async fn set(&self, group_id: &str, message_id: &str) {
        self.cursors
            .write()
            .await
            .insert(group_id.to_string(), message_id.to_string());
    }

    async fn clear(&self, group_id: &str) -> bool {
        self.cursors.write().await.remove(group_id).is_some()
    }
}
