//! Tests for the POST /keys/issue endpoint.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

#[tokio::test]
async fn issuance_requires_credential() {
    let state = create_test_app_state();
    let app = app(state);

    let response = app
        .clone()
        .oneshot(post_json(
            "/keys/issue",
            None,
            &json!({"key_type": "lifetime", "count": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(post_json(
            "/keys/issue",
            Some("wrong-credential"),
            &json!({"key_type": "lifetime", "count": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_credential_does_not_open_issuance() {
    let state = create_test_app_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/keys/issue",
            Some(TEST_ADMIN_KEY),
            &json!({"key_type": "lifetime", "count": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn issues_batch_of_unbound_keys() {
    let state = create_test_app_state();
    let app = app(state.clone());

    let response = app
        .oneshot(post_json(
            "/keys/issue",
            Some(TEST_ISSUANCE_KEY),
            &json!({"key_type": "single_use", "count": 5}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 5);

    let conn = state.db.get().unwrap();
    for entry in keys {
        let key_code = entry["key_code"].as_str().unwrap();
        assert!(keygen::is_valid_key_code(key_code), "bad format: {}", key_code);
        assert_eq!(entry["key_type"], "single_use");

        // Activation id is derived over the empty HWID
        assert_eq!(
            entry["activation_id"].as_str().unwrap(),
            keygen::activation_id("", key_code)
        );

        let stored = get_key(&conn, key_code);
        assert!(!stored.is_bound());
        assert_eq!(stored.activated_at, None);
        assert!(!stored.revoked);
    }
}

#[tokio::test]
async fn issued_key_codes_are_distinct() {
    let state = create_test_app_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/keys/issue",
            Some(TEST_ISSUANCE_KEY),
            &json!({"key_type": "lifetime", "count": 50}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let keys = body["keys"].as_array().unwrap();
    let mut seen = std::collections::HashSet::new();
    for entry in keys {
        assert!(seen.insert(entry["key_code"].as_str().unwrap().to_string()));
    }
}

#[tokio::test]
async fn count_bounds_are_enforced() {
    let state = create_test_app_state();
    let app = app(state);

    for count in [0, 301] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/keys/issue",
                Some(TEST_ISSUANCE_KEY),
                &json!({"key_type": "lifetime", "count": count}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "count {}", count);
    }
}

#[tokio::test]
async fn unknown_key_type_is_rejected() {
    let state = create_test_app_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/keys/issue",
            Some(TEST_ISSUANCE_KEY),
            &json!({"key_type": "perpetual", "count": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
