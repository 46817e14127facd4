//! Shared-secret authentication for the issuance and admin surfaces.
//!
//! Both credentials are long fixed secrets supplied as Bearer tokens and
//! compared in constant time. A failed check is a generic 401 with no
//! detail about which part of the comparison failed.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::util::extract_bearer_token;

/// Constant-time equality for shared secrets. Slices of unequal length
/// compare unequal without an early exit on content.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn check_credential(headers: &HeaderMap, expected: &str) -> Result<(), StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if secrets_match(token, expected) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Gate for `POST /keys/issue`.
pub async fn issuance_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    check_credential(request.headers(), &state.issuance_key)?;
    Ok(next.run(request).await)
}

/// Gate for the admin endpoints (listing, reissue, transfer requests).
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    check_credential(request.headers(), &state.admin_key)?;
    Ok(next.run(request).await)
}
