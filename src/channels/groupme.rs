//! GroupMe fetcher for groups, group metadata and per-group messages.
//!
//! Uses the v3 REST API with a process-wide access token. When unread tracking
//! is on, each group's newest seen message id is kept in a [`CursorStore`] and
//! sent as `since_id` on the next fetch, so only new messages come back.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cursor::CursorStore;
use super::groupme_types::{
    ChatMessage, Envelope, GroupInfo, GroupMessages, GroupSummary, RawGroup, RawMessagesPage,
};
use crate::error::ProviderError;

/// Default GroupMe API base URL.
pub const GROUPME_API_BASE: &str = "https://api.groupme.com/v3";

/// Default number of messages fetched per group.
pub const DEFAULT_MESSAGE_LIMIT: u32 = 10;

/// GroupMe caps `limit` at 100 messages per page.
const MAX_MESSAGE_LIMIT: u32 = 100;

/// Groups requested per page from `/groups`.
const GROUPS_PER_PAGE: u32 = 50;

/// GroupMe REST client.
#[derive(Clone)]
pub struct GroupMeClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    cursors: Arc<dyn CursorStore>,
    /// Held across cursor read, fetch and cursor write for one group.
    group_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    track_unread: bool,
}

impl GroupMeClient {
    pub fn new(client: reqwest::Client, token: SecretString, cursors: Arc<dyn CursorStore>) -> Self {
        Self {
            client,
            base_url: GROUPME_API_BASE.to_string(),
            token,
            cursors,
            group_locks: Arc::default(),
            track_unread: true,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Enable or disable `since_id` incremental fetching.
    pub fn with_unread_tracking(mut self, enabled: bool) -> Self {
        self.track_unread = enabled;
        self
    }

    pub fn cursors(&self) -> &Arc<dyn CursorStore> {
        &self.cursors
    }

    /// List the groups the token's user belongs to.
    pub async fn list_groups(&self) -> Result<Vec<GroupSummary>, ProviderError> {
        let groups = self.fetch_groups().await?;
        Ok(groups.into_iter().map(GroupSummary::from).collect())
    }

    /// Metadata for a single group.
    pub async fn group_info(&self, group_id: &str) -> Result<GroupInfo, ProviderError> {
        let raw: Option<RawGroup> = self.get(&format!("/groups/{group_id}"), &[]).await?;
        raw.map(GroupInfo::from)
            .ok_or_else(|| ProviderError::Http(format!("no data returned for group {group_id}")))
    }

    /// Resolve a group's display name by scanning the group list.
    pub async fn get_group_name(&self, group_id: &str) -> Result<Option<String>, ProviderError> {
        let groups = self.fetch_groups().await?;
        Ok(groups.into_iter().find(|g| g.id == group_id).map(|g| g.name))
    }

    /// Fetch up to `limit` recent messages for one group.
    pub async fn list_messages_for_group(
        &self,
        group_id: &str,
        limit: u32,
    ) -> Result<GroupMessages, ProviderError> {
        let name = self
            .get_group_name(group_id)
            .await?
            .unwrap_or_else(|| group_id.to_string());
        self.fetch_group_messages(group_id, &name, limit).await
    }

    /// Fetch messages for every group, one group at a time.
    ///
    /// A group that fails is logged and skipped; the rest are still returned.
    pub async fn list_messages_for_all_groups(
        &self,
        limit: u32,
    ) -> Result<Vec<GroupMessages>, ProviderError> {
        let groups = self.fetch_groups().await?;
        let total = groups.len();

        let mut bundles = Vec::with_capacity(total);
        for group in groups {
            match self.fetch_group_messages(&group.id, &group.name, limit).await {
                Ok(bundle) => bundles.push(bundle),
                Err(e) => {
                    warn!(group_id = %group.id, error = %e, "Skipping group after fetch failure");
                }
            }
        }

        info!(fetched = bundles.len(), total, "Fetched messages for all groups");
        Ok(bundles)
    }

    async fn fetch_groups(&self) -> Result<Vec<RawGroup>, ProviderError> {
        let groups: Option<Vec<RawGroup>> = self
            .get("/groups", &[("per_page", GROUPS_PER_PAGE.to_string())])
            .await?;
        Ok(groups.unwrap_or_default())
    }

    async fn fetch_group_messages(
        &self,
        group_id: &str,
        group_name: &str,
        limit: u32,
    ) -> Result<GroupMessages, ProviderError> {
        let group_lock = self.group_lock(group_id).await;
        let _guard = group_lock.lock().await;

        let mut params = vec![("limit", limit.clamp(1, MAX_MESSAGE_LIMIT).to_string())];

        let since = if self.track_unread {
            self.cursors.get(group_id).await
        } else {
            None
        };
        if let Some(ref since_id) = since {
            params.push(("since_id", since_id.clone()));
        }

        let page: Option<RawMessagesPage> = self
            .get(&format!("/groups/{group_id}/messages"), &params)
            .await?;
        let messages: Vec<ChatMessage> = page
            .map(|p| p.messages.into_iter().map(ChatMessage::from).collect())
            .unwrap_or_default();

        let bundle = GroupMessages::new(group_id, group_name, messages);

        if self.track_unread
            && let Some(newest) = bundle.newest_message_id()
        {
            self.cursors.set(group_id, newest).await;
        }

        debug!(
            group_id,
            since = since.as_deref().unwrap_or("none"),
            count = bundle.unread_count,
            "Fetched group messages"
        );
        Ok(bundle)
    }

    async fn group_lock(&self, group_id: &str) -> Arc<Mutex<()>> {
        self.group_locks
            .lock()
            .await
            .entry(group_id.to_string())
            .or_default()
            .clone()
    }

    /// GET a v3 endpoint and unwrap its `response` envelope.
    ///
    /// `304 Not Modified` (nothing newer than `since_id`) maps to `None`.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, ProviderError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Access-Token", self.token.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.without_url().to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Chat {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Http(e.without_url().to_string()))?;
        Ok(envelope.response)
    }
}
