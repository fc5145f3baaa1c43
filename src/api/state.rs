//! Shared application state for the HTTP facade.

use std::sync::Arc;

use crate::channels::{CursorStore, GmailClient, GroupMeClient, InMemoryCursorStore};
use crate::config::{AppConfig, MailSettings};
use crate::error::ProviderError;
use crate::llm::LlmProvider;
use crate::pipeline::RelevanceFilter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub gmail: GmailClient,
    pub groupme: GroupMeClient,
    /// `None` when no LLM is configured.
    pub filter: Option<Arc<RelevanceFilter>>,
    pub mail: MailSettings,
    pub redact_upstream_errors: bool,
}

impl AppState {
    /// Build clients from configuration with an in-memory cursor store.
    pub fn from_config(
        config: &AppConfig,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self, ProviderError> {
        Self::with_cursor_store(config, llm, Arc::new(InMemoryCursorStore::new()))
    }

    pub fn with_cursor_store(
        config: &AppConfig,
        llm: Option<Arc<dyn LlmProvider>>,
        cursors: Arc<dyn CursorStore>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to build HTTP client: {e}")))?;

        let gmail = GmailClient::with_base_url(client.clone(), &config.gmail_api_base);
        let groupme = GroupMeClient::new(client, config.groupme_token.clone(), cursors)
            .with_base_url(&config.groupme_api_base)
            .with_unread_tracking(config.track_unread);

        let filter = llm.map(|llm| {
            Arc::new(
                RelevanceFilter::new(llm).with_body_char_budget(config.mail.body_char_budget),
            )
        });

        Ok(Self {
            gmail,
            groupme,
            filter,
            mail: config.mail.clone(),
            redact_upstream_errors: config.redact_upstream_errors,
        })
    }
}
