//! Ownership-transfer requests.
//!
//! An admin registers the purchaser's email and triggers delivery of a
//! 6-digit verification code; the purchaser completes the flow through the
//! public `POST /transfer/confirm` endpoint.

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::keygen;
use crate::lifecycle::TRANSFER_CODE_TTL_SECS;
use crate::notify::NotifyResult;

#[derive(Debug, Deserialize)]
pub struct RequestTransferRequest {
    pub key_code: String,
    /// Purchaser address the verification code is delivered to
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RequestTransferResponse {
    /// Whether the code reached the notification channel
    pub sent: bool,
}

fn is_plausible_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// POST /admin/transfer/request
///
/// Stores a hashed 6-digit code with a 24-hour expiry on the record
/// (overwriting any previous pending code) and hands the plaintext to the
/// notifier. Delivery failure leaves the stored code in place - the admin
/// can re-request, which mints a new code.
pub async fn request_transfer(
    State(state): State<AppState>,
    Json(req): Json<RequestTransferRequest>,
) -> Result<Json<RequestTransferResponse>> {
    let email = req.email.trim().to_lowercase();
    if !is_plausible_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".into()));
    }

    let conn = state.db.get()?;

    let Some(key) = queries::get_key_by_code(&conn, &req.key_code)? else {
        return Err(AppError::NotFound("Key not found".into()));
    };

    // Revocation is terminal; a revoked key cannot be transferred.
    if key.revoked {
        return Err(AppError::BadRequest("Key is revoked".into()));
    }

    let code = keygen::generate_transfer_code();
    let expires_at = Utc::now().timestamp() + TRANSFER_CODE_TTL_SECS;
    queries::set_transfer_code(&conn, &key.key_code, &keygen::hash_code(&code), expires_at, &email)?;

    let sent = match state
        .notifier
        .transfer_code(&email, &key.key_code, &code, expires_at)
        .await
    {
        Ok(NotifyResult::Sent) => true,
        Ok(NotifyResult::Disabled) => {
            tracing::warn!(
                key_code = %key.key_code,
                "No notification webhook configured; transfer code not delivered"
            );
            false
        }
        Err(e) => {
            tracing::error!(key_code = %key.key_code, error = %e, "Transfer code delivery failed");
            false
        }
    };

    Ok(Json(RequestTransferResponse { sent }))
}
