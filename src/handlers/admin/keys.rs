//! Admin listing and revoke-and-reissue.

use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::models::{IssuedKey, KeyType, LicenseKey};
use crate::notify::spawn_key_notification;
use crate::util::extract_request_info;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListKeysQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    pub keys: Vec<LicenseKey>,
    pub total: i64,
}

/// GET /admin/keys
///
/// Every record, revoked ones included, newest first.
pub async fn list_keys(
    State(state): State<AppState>,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<ListKeysResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let conn = state.db.get()?;
    let (keys, total) = queries::list_keys(&conn, limit, offset)?;

    Ok(Json(ListKeysResponse { keys, total }))
}

#[derive(Debug, Deserialize)]
pub struct ReissueRequest {
    /// Key code or activation id of the record to revoke
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ReissueResponse {
    /// The now-revoked key code
    pub old_key: String,
    pub new_key: LicenseKey,
}

/// POST /admin/reissue
///
/// Revoke the target record and mint a fresh unbound `lifetime` key as its
/// replacement. The registered email, if any, carries over. This is the
/// only supported transfer mechanism - there is no in-place HWID change.
pub async fn reissue_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReissueRequest>,
) -> Result<Json<ReissueResponse>> {
    let mut conn = state.db.get()?;

    let Some(old) = queries::find_key(&conn, &req.key)? else {
        return Err(AppError::NotFound("Key not found".into()));
    };

    let new_key = queries::reissue_key(&mut conn, &old.key_code, KeyType::Lifetime, old.email.as_deref())?;

    let (ip, _) = extract_request_info(&headers);
    tracing::info!(
        old_key = %old.key_code,
        new_key = %new_key.key_code,
        ip = ip.as_deref().unwrap_or("unknown"),
        "Key revoked and reissued"
    );

    spawn_key_notification(state.notifier.clone(), vec![IssuedKey::from(&new_key)]);

    Ok(Json(ReissueResponse {
        old_key: old.key_code,
        new_key,
    }))
}
