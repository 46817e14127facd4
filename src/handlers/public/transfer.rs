//! Ownership-transfer confirmation.
//!
//! The counterpart to `POST /admin/transfer/request`: the purchaser
//! receives a 6-digit verification code out of band and presents it here.
//! A correct, unexpired code revokes the old key and mints a fresh unbound
//! key of the same type, carrying the registered email over. The code is
//! single-use: reissue clears it from the revoked record.

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::keygen;
use crate::middleware::secrets_match;
use crate::models::{IssuedKey, KeyType, LicenseKey};
use crate::notify::spawn_key_notification;

#[derive(Debug, Deserialize)]
pub struct ConfirmTransferRequest {
    pub key_code: String,
    pub verification_code: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmTransferResponse {
    /// The now-revoked key code
    pub old_key: String,
    pub new_key: LicenseKey,
    pub key_type: KeyType,
}

pub async fn confirm_transfer(
    State(state): State<AppState>,
    Json(req): Json<ConfirmTransferRequest>,
) -> Result<Json<ConfirmTransferResponse>> {
    let mut conn = state.db.get()?;

    let Some(key) = queries::get_key_by_code(&conn, &req.key_code)? else {
        return Err(AppError::NotFound("Key not found".into()));
    };

    let Some(ref stored_hash) = key.transfer_code_hash else {
        return Err(AppError::BadRequest(
            "No transfer is pending for this key".into(),
        ));
    };

    let now = Utc::now().timestamp();
    if key.transfer_code_expires_at.is_none_or(|exp| now > exp) {
        return Err(AppError::BadRequest("Verification code expired".into()));
    }

    if !secrets_match(&keygen::hash_code(&req.verification_code), stored_hash) {
        return Err(AppError::BadRequest(
            "Verification code does not match".into(),
        ));
    }

    // Same revoke-and-reissue as the admin flow, but preserving the
    // original key type along with the registered email.
    let new_key = queries::reissue_key(&mut conn, &key.key_code, key.key_type, key.email.as_deref())?;

    tracing::info!(
        old_key = %key.key_code,
        new_key = %new_key.key_code,
        "Ownership transfer confirmed"
    );

    spawn_key_notification(state.notifier.clone(), vec![IssuedKey::from(&new_key)]);

    Ok(Json(ConfirmTransferResponse {
        old_key: key.key_code,
        key_type: new_key.key_type,
        new_key,
    }))
}
