mod issue;
mod keys;
mod transfer;

pub use issue::*;
pub use keys::*;
pub use transfer::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::{admin_auth, issuance_auth};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Key issuance (issuance credential)
        .route("/keys/issue", post(issue_keys))
        .layer(middleware::from_fn_with_state(state.clone(), issuance_auth))
        .merge(
            Router::new()
                // Listing, reissue and transfer requests (admin credential)
                .route("/admin/keys", get(list_keys))
                .route("/admin/reissue", post(reissue_key))
                .route("/admin/transfer/request", post(request_transfer))
                .layer(middleware::from_fn_with_state(state.clone(), admin_auth)),
        )
}
