//! Tests for GET /admin/keys and POST /admin/reissue.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

#[tokio::test]
async fn admin_endpoints_require_credential() {
    let state = create_test_app_state();
    let app = app(state);

    let response = app
        .clone()
        .oneshot(get_request("/admin/keys", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get_request("/admin/keys", Some(TEST_ISSUANCE_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(post_json(
            "/admin/reissue",
            Some("wrong"),
            &json!({"key": "AAAAA-BBBBB-CCCCC-DDDDD"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn listing_includes_revoked_records() {
    let state = create_test_app_state();
    {
        let mut conn = state.db.get().unwrap();
        let first = create_test_key(&conn, KeyType::Lifetime).key_code;
        create_test_key(&conn, KeyType::SingleUse);
        queries::reissue_key(&mut conn, &first, KeyType::Lifetime, None).unwrap();
    }
    let app = app(state);

    let response = app
        .oneshot(get_request("/admin/keys", Some(TEST_ADMIN_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    // two issued + one minted by the reissue
    assert_eq!(body["total"], 3);
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 3);
    assert_eq!(
        keys.iter().filter(|k| k["revoked"] == true).count(),
        1,
        "revoked record should remain listed"
    );
}

#[tokio::test]
async fn listing_respects_pagination() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        for _ in 0..5 {
            create_test_key(&conn, KeyType::Lifetime);
        }
    }
    let app = app(state);

    let response = app
        .oneshot(get_request(
            "/admin/keys?limit=2&offset=4",
            Some(TEST_ADMIN_KEY),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["keys"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reissue_revokes_old_and_mints_unbound_lifetime() {
    let state = create_test_app_state();
    let key_code;
    {
        let conn = state.db.get().unwrap();
        key_code = create_test_key(&conn, KeyType::SingleUse).key_code;
        bind_test_key(&conn, &key_code, "device-A", now());
    }
    let app = app(state.clone());

    let response = app
        .oneshot(post_json(
            "/admin/reissue",
            Some(TEST_ADMIN_KEY),
            &json!({"key": key_code}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["old_key"], key_code.as_str());

    let new_code = body["new_key"]["key_code"].as_str().unwrap().to_string();
    assert_ne!(new_code, key_code);
    // Reissue always mints a lifetime key, whatever the original type was
    assert_eq!(body["new_key"]["key_type"], "lifetime");
    assert_eq!(body["new_key"]["reissued_from"], key_code.as_str());

    let conn = state.db.get().unwrap();
    let old = get_key(&conn, &key_code);
    assert!(old.revoked);
    // The old binding is untouched - the record is kept for audit
    assert_eq!(old.hwid, "device-A");

    let new = get_key(&conn, &new_code);
    assert!(!new.revoked);
    assert!(!new.is_bound());
    assert_eq!(new.activated_at, None);
    assert_eq!(new.activation_id, keygen::activation_id("", &new_code));
}

#[tokio::test]
async fn reissue_accepts_activation_id_as_identifier() {
    let state = create_test_app_state();
    let key;
    {
        let conn = state.db.get().unwrap();
        key = create_test_key(&conn, KeyType::Lifetime);
    }
    let app = app(state.clone());

    let response = app
        .oneshot(post_json(
            "/admin/reissue",
            Some(TEST_ADMIN_KEY),
            &json!({"key": key.activation_id}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["old_key"], key.key_code.as_str());

    let conn = state.db.get().unwrap();
    assert!(get_key(&conn, &key.key_code).revoked);
}

#[tokio::test]
async fn reissue_unknown_key_is_not_found() {
    let state = create_test_app_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/admin/reissue",
            Some(TEST_ADMIN_KEY),
            &json!({"key": "AAAAA-BBBBB-CCCCC-DDDDD"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reissued_key_stays_revoked_after_second_reissue_of_replacement() {
    // Revocation is terminal: reissuing the replacement never touches the
    // original record again.
    let state = create_test_app_state();
    let first;
    {
        let conn = state.db.get().unwrap();
        first = create_test_key(&conn, KeyType::Lifetime).key_code;
    }
    let app = app(state.clone());

    let response = app
        .clone()
        .oneshot(post_json(
            "/admin/reissue",
            Some(TEST_ADMIN_KEY),
            &json!({"key": first}),
        ))
        .await
        .unwrap();
    let second = json_body(response).await["new_key"]["key_code"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(post_json(
            "/admin/reissue",
            Some(TEST_ADMIN_KEY),
            &json!({"key": second}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    assert!(get_key(&conn, &first).revoked);
    assert!(get_key(&conn, &second).revoked);
}
