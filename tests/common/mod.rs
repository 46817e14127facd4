//! Test utilities and fixtures for Keygate integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::post;
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use serde_json::Value;

pub use keygate::db::{init_db, queries, AppState};
pub use keygate::handlers::public::{confirm_transfer, validate_key};
pub use keygate::keygen;
pub use keygate::models::*;
pub use keygate::notify::Notifier;

pub const TEST_ISSUANCE_KEY: &str = "test-issuance-key-0123456789abcdef";
pub const TEST_ADMIN_KEY: &str = "test-admin-key-0123456789abcdef";

/// Create an AppState backed by a single-connection in-memory database.
///
/// A single connection guarantees every pool checkout sees the schema the
/// fixture initialized.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        issuance_key: TEST_ISSUANCE_KEY.to_string(),
        admin_key: TEST_ADMIN_KEY.to_string(),
        notifier: Arc::new(Notifier::new(None)),
    }
}

/// Create a Router with all endpoints (without rate limiting for tests).
/// The admin router keeps its auth middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/validate", post(validate_key))
        .route("/transfer/confirm", post(confirm_transfer))
        .merge(keygate::handlers::admin::router(state.clone()))
        .with_state(state)
}

/// Insert an unbound test key of the given type.
pub fn create_test_key(conn: &Connection, key_type: KeyType) -> LicenseKey {
    queries::insert_new_key(conn, key_type, None, None).expect("Failed to create test key")
}

/// Bind a key to a device the way the validate endpoint would.
pub fn bind_test_key(conn: &Connection, key_code: &str, hwid: &str, activated_at: i64) {
    let activation_id = keygen::activation_id(hwid, key_code);
    let bound = queries::try_bind_key(conn, key_code, hwid, &activation_id, activated_at)
        .expect("Failed to bind test key");
    assert!(bound, "Test key should have been unbound");
}

/// Rewrite a bound key's activation time (for expiry-boundary tests).
pub fn set_activated_at(conn: &Connection, key_code: &str, activated_at: i64) {
    let affected = conn
        .execute(
            "UPDATE license_keys SET activated_at = ?2 WHERE key_code = ?1",
            params![key_code, activated_at],
        )
        .expect("Failed to set activation time");
    assert_eq!(affected, 1);
}

/// Overwrite a record's stored activation id, simulating a record that was
/// regenerated server-side since the client last synced.
pub fn corrupt_activation_id(conn: &Connection, key_code: &str) {
    let affected = conn
        .execute(
            "UPDATE license_keys SET activation_id = '0000000000000000000001' WHERE key_code = ?1",
            params![key_code],
        )
        .expect("Failed to overwrite activation id");
    assert_eq!(affected, 1);
}

/// Rewrite a pending transfer code's expiry (for expiry tests).
pub fn set_transfer_code_expiry(conn: &Connection, key_code: &str, expires_at: i64) {
    let affected = conn
        .execute(
            "UPDATE license_keys SET transfer_code_expires_at = ?2 WHERE key_code = ?1",
            params![key_code, expires_at],
        )
        .expect("Failed to set transfer code expiry");
    assert_eq!(affected, 1);
}

pub fn get_key(conn: &Connection, key_code: &str) -> LicenseKey {
    queries::get_key_by_code(conn, key_code)
        .expect("Lookup failed")
        .expect("Key should exist")
}

/// Get the current timestamp.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build a JSON POST request, optionally with a Bearer credential.
pub fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a GET request, optionally with a Bearer credential.
pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Read a response body as JSON.
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("Response should be valid JSON")
}
