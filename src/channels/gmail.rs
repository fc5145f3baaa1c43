//! Gmail fetcher. Lists messages over a date range and normalizes them.
//!
//! Talks to the Gmail REST API directly with the caller's OAuth access token.
//! The token is never stored; it is passed per call.

use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::gmail_types::{GmailMessage, MailRecord, MessagesListResponse};
use crate::error::ProviderError;

/// Default Gmail API base URL.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Default number of emails fetched per request.
pub const DEFAULT_MAX_RESULTS: u32 = 10;

/// Gmail rejects `maxResults` above this.
const GMAIL_MAX_RESULTS: u32 = 500;

/// Parameters for one mail fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailQuery {
    pub max_results: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Restrict the search to unread messages.
    pub unread_only: bool,
}

impl Default for MailQuery {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            start_date: None,
            end_date: None,
            unread_only: false,
        }
    }
}

impl MailQuery {
    /// Gmail search string, e.g. `after:1704067200 before:1704153600`.
    pub fn search_query(&self) -> String {
        let mut terms = Vec::new();
        if self.unread_only {
            terms.push("is:unread".to_string());
        }
        if let Some(start) = self.start_date {
            terms.push(format!("after:{}", date_to_timestamp(start)));
        }
        if let Some(end) = self.end_date {
            terms.push(format!("before:{}", date_to_timestamp(end)));
        }
        terms.join(" ")
    }
}

/// Unix timestamp of midnight UTC on `date`.
fn date_to_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Gmail REST client.
#[derive(Clone)]
pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
}

impl GmailClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, GMAIL_API_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch up to `query.max_results` emails, in the order Gmail lists them.
    pub async fn fetch_emails(
        &self,
        access_token: &str,
        query: &MailQuery,
    ) -> Result<Vec<MailRecord>, ProviderError> {
        if query.max_results == 0 {
            return Ok(Vec::new());
        }

        let ids = self.list_message_ids(access_token, query).await?;
        info!(count = ids.len(), "Listed Gmail messages");

        let mut records = Vec::with_capacity(ids.len());
        for id in ids.iter().take(query.max_results as usize) {
            let message = self.get_message(access_token, id).await?;
            records.push(MailRecord::from_message(&message));
        }

        debug!(count = records.len(), "Fetched Gmail message details");
        Ok(records)
    }

    async fn list_message_ids(
        &self,
        access_token: &str,
        query: &MailQuery,
    ) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/users/me/messages", self.base_url);
        let mut params = vec![(
            "maxResults",
            query.max_results.min(GMAIL_MAX_RESULTS).to_string(),
        )];
        let q = query.search_query();
        if !q.is_empty() {
            debug!(query = %q, "Gmail search query");
            params.push(("q", q));
        }

        let list: MessagesListResponse = self.get_json(&url, access_token, &params).await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(
        &self,
        access_token: &str,
        id: &str,
    ) -> Result<GmailMessage, ProviderError> {
        let url = format!("{}/users/me/messages/{}", self.base_url, id);
        self.get_json(&url, access_token, &[("format", "full".to_string())])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Mail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Mail(format!("HTTP {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Mail(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn empty_query_without_bounds() {
        assert_eq!(MailQuery::default().search_query(), "");
    }

    #[test]
    fn query_with_both_bounds_is_space_joined() {
        let query = MailQuery {
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-01-02")),
            ..Default::default()
        };
        assert_eq!(query.search_query(), "after:1704067200 before:1704153600");
    }

    #[test]
    fn query_with_only_end_bound() {
        let query = MailQuery {
            end_date: Some(date("2024-01-01")),
            ..Default::default()
        };
        assert_eq!(query.search_query(), "before:1704067200");
    }

    #[test]
    fn unread_only_adds_term() {
        let query = MailQuery {
            unread_only: true,
            start_date: Some(date("2024-01-01")),
            ..Default::default()
        };
        assert_eq!(query.search_query(), "is:unread after:1704067200");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GmailClient::with_base_url(reqwest::Client::new(), "http://localhost:9/");
        assert_eq!(client.base_url, "http://localhost:9");
    }

    #[tokio::test]
    async fn zero_max_results_skips_network() {
        // Port 9 is never contacted: the call returns before any request.
        let client = GmailClient::with_base_url(reqwest::Client::new(), "http://127.0.0.1:9");
        let query = MailQuery {
            max_results: 0,
            ..Default::default()
        };
        let records = client.fetch_emails("token", &query).await.unwrap();
        assert!(records.is_empty());
    }
}
