//! REST endpoints for mail and group feeds.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::state::AppState;
use crate::channels::gmail::DEFAULT_MAX_RESULTS;
use crate::channels::groupme::DEFAULT_MESSAGE_LIMIT;
use crate::channels::{GroupInfo, GroupMessages, GroupSummary, MailQuery};
use crate::error::ApiError;
use crate::pipeline::FilterResult;

/// Build the API routes.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/emails", get(get_emails))
        .route("/groups", get(list_groups))
        .route("/groups/messages", get(all_group_messages))
        .route("/groups/{group_id}/messages", get(group_messages))
        .route("/groups/{group_id}/info", get(group_info))
        .route("/groups/{group_id}/cursor", delete(reset_cursor))
        .with_state(state)
}

/// API routes with CORS and request tracing applied.
pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    api_routes(state)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Allow the listed browser origins with credentials, any method and any header.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

// ── Misc ────────────────────────────────────────────────────────────────

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Hello, World!" }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "feed-relay"
    }))
}

// ── Emails ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct EmailsParams {
    /// YYYY-MM-DD
    pub start_date: Option<String>,
    /// YYYY-MM-DD
    pub end_date: Option<String>,
    pub max_results: Option<u32>,
    /// Override the configured relevance filter for this request.
    pub filter: Option<bool>,
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header format".into()))
}

fn parse_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{name} must be YYYY-MM-DD, got '{s}'"))),
    }
}

/// GET /emails
///
/// Fetches mail with the caller's Gmail token and, unless disabled, keeps
/// only the emails the relevance filter selects.
async fn get_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<EmailsParams>, QueryRejection>,
) -> Result<Json<FilterResult>, ApiError> {
    let token = bearer_token(&headers)?;
    let Query(params) = params?;
    let redact = state.redact_upstream_errors;

    let query = MailQuery {
        max_results: params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        start_date: parse_date("start_date", params.start_date.as_deref())?,
        end_date: parse_date("end_date", params.end_date.as_deref())?,
        unread_only: state.mail.unread_only,
    };

    let records = state
        .gmail
        .fetch_emails(token, &query)
        .await
        .map_err(|e| ApiError::from(e).redacted(redact))?;

    let use_filter = params.filter.unwrap_or(state.mail.relevance_filter);
    let result = match state.filter.as_ref() {
        Some(filter) if use_filter => filter
            .filter(records)
            .await
            .map_err(|e| ApiError::from(e).redacted(redact))?,
        _ => FilterResult::unfiltered(records),
    };

    info!(
        returned = result.emails.len(),
        filtered_out = result.filtered_out,
        "Served emails"
    );
    Ok(Json(result))
}

// ── Groups ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

impl LimitParams {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT)
    }
}

/// GET /groups
async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<GroupSummary>>, ApiError> {
    let groups = state
        .groupme
        .list_groups()
        .await
        .map_err(|e| ApiError::from(e).redacted(state.redact_upstream_errors))?;
    Ok(Json(groups))
}

/// GET /groups/messages
///
/// Groups that fail to load are skipped, not reported as an error.
async fn all_group_messages(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<GroupMessages>>, ApiError> {
    let Query(params) = params?;
    let bundles = state
        .groupme
        .list_messages_for_all_groups(params.limit())
        .await
        .map_err(|e| ApiError::from(e).redacted(state.redact_upstream_errors))?;
    Ok(Json(bundles))
}

/// GET /groups/{group_id}/messages
async fn group_messages(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<GroupMessages>, ApiError> {
    let Query(params) = params?;
    let bundle = state
        .groupme
        .list_messages_for_group(&group_id, params.limit())
        .await
        .map_err(|e| ApiError::from(e).redacted(state.redact_upstream_errors))?;
    Ok(Json(bundle))
}

/// GET /groups/{group_id}/info
async fn group_info(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupInfo>, ApiError> {
    let info = state
        .groupme
        .group_info(&group_id)
        .await
        .map_err(|e| ApiError::from(e).redacted(state.redact_upstream_errors))?;
    Ok(Json(info))
}

/// DELETE /groups/{group_id}/cursor
///
/// Forget the last-seen message so the next fetch returns recent history again.
async fn reset_cursor(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> impl IntoResponse {
    let existed = state.groupme.cursors().clear(&group_id).await;
    info!(group_id = %group_id, existed, "Reset group cursor");
    StatusCode::NO_CONTENT
}
