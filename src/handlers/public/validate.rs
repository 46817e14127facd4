//! Key validation and first-use binding.
//!
//! `POST /validate` is called on every client-side license check. For an
//! unbound key the call performs the bind itself - there is no separate
//! activation step, so the first call has a side effect later calls do
//! not. The bind is an atomic conditional update; a request that loses a
//! concurrent first-activation race re-reads the record and is evaluated
//! against the winner's binding.

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::keygen;
use crate::lifecycle::{self, Decision};
use crate::models::{KeyType, LicenseKey};

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub key_code: String,
    /// Hardware fingerprint of the calling device
    pub hwid: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_id: Option<String>,
    /// Instructs the client to discard cached credentials and reactivate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<bool>,
    /// Instructs the client to resynchronize with the returned record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<bool>,
    /// Current record, returned alongside `update`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<LicenseKey>,
    pub message: &'static str,
}

impl ValidateResponse {
    fn invalid(message: &'static str) -> Self {
        Self {
            valid: false,
            key_type: None,
            activated_at: None,
            activation_id: None,
            reset: None,
            update: None,
            key: None,
            message,
        }
    }

    fn revoked() -> Self {
        Self {
            reset: Some(true),
            ..Self::invalid("License revoked. Discard the cached license and activate a new key.")
        }
    }

    fn stale(current: LicenseKey) -> Self {
        Self {
            update: Some(true),
            key: Some(current),
            ..Self::invalid("Key was reissued server-side. The license will be updated.")
        }
    }

    fn valid(key_type: KeyType, activated_at: Option<i64>, activation_id: String) -> Self {
        Self {
            valid: true,
            key_type: Some(key_type),
            activated_at,
            activation_id: Some(activation_id),
            reset: None,
            update: None,
            key: None,
            message: "Key validated successfully.",
        }
    }
}

/// Map a final lifecycle decision to its response. `NeedsBind` has no
/// response - the caller must run the bind step first.
fn respond(decision: Decision, key: LicenseKey) -> Option<ValidateResponse> {
    match decision {
        Decision::Revoked => Some(ValidateResponse::revoked()),
        Decision::DeviceMismatch => Some(ValidateResponse::invalid("Authorization refused.")),
        Decision::Stale => Some(ValidateResponse::stale(key)),
        Decision::Expired => Some(ValidateResponse::invalid("Key expired.")),
        Decision::Valid => Some(ValidateResponse::valid(
            key.key_type,
            key.activated_at,
            key.activation_id,
        )),
        Decision::NeedsBind => None,
    }
}

pub async fn validate_key(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>> {
    if req.hwid.trim().is_empty() {
        return Err(AppError::BadRequest("hwid is required".into()));
    }

    // Malformed codes cannot exist in the store; skip the lookup
    if !keygen::is_valid_key_code(&req.key_code) {
        return Ok(Json(ValidateResponse::invalid("Unknown key.")));
    }

    let conn = state.db.get()?;

    let Some(key) = queries::get_key_by_code(&conn, &req.key_code)? else {
        return Ok(Json(ValidateResponse::invalid("Unknown key.")));
    };

    let now = Utc::now().timestamp();

    if let Some(response) = respond(lifecycle::evaluate(&key, &req.hwid, now), key.clone()) {
        return Ok(Json(response));
    }

    // First use: bind the key to this device. The conditional update only
    // applies while the record is still unbound and unrevoked.
    let activation_id = keygen::activation_id(&req.hwid, &key.key_code);
    if queries::try_bind_key(&conn, &key.key_code, &req.hwid, &activation_id, now)? {
        tracing::info!(
            key_code = %key.key_code,
            key_type = key.key_type.as_ref(),
            "Key bound on first validation"
        );
        return Ok(Json(ValidateResponse::valid(
            key.key_type,
            Some(now),
            activation_id,
        )));
    }

    // Lost the race against a concurrent first validation (or a revoke);
    // evaluate whatever state won.
    let Some(current) = queries::get_key_by_code(&conn, &req.key_code)? else {
        return Ok(Json(ValidateResponse::invalid("Unknown key.")));
    };

    match respond(lifecycle::evaluate(&current, &req.hwid, now), current) {
        Some(response) => Ok(Json(response)),
        None => Err(AppError::Internal(
            "Bind did not apply and key is still unbound".into(),
        )),
    }
}
