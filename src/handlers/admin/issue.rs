//! Batch key issuance.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{IssuedKey, KeyType};
use crate::notify::spawn_key_notification;

/// Upper bound on a single issuance batch, to prevent runaway inserts.
const MAX_ISSUE_COUNT: u32 = 300;

#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub key_type: KeyType,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub keys: Vec<IssuedKey>,
}

/// POST /keys/issue
///
/// Mint `count` fresh unbound keys of the requested type. Each unit is an
/// independent insert; a store-level uniqueness violation is retried
/// inside the insert rather than failing the batch.
pub async fn issue_keys(
    State(state): State<AppState>,
    Json(req): Json<IssueRequest>,
) -> Result<Json<IssueResponse>> {
    if req.count < 1 || req.count > MAX_ISSUE_COUNT {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_ISSUE_COUNT
        )));
    }

    let conn = state.db.get()?;

    let mut issued = Vec::with_capacity(req.count as usize);
    for _ in 0..req.count {
        let key = queries::insert_new_key(&conn, req.key_type, None, None)?;
        issued.push(IssuedKey::from(&key));
    }

    tracing::info!(
        count = issued.len(),
        key_type = req.key_type.as_ref(),
        "Issued key batch"
    );

    spawn_key_notification(state.notifier.clone(), issued.clone());

    Ok(Json(IssueResponse { keys: issued }))
}
