mod transfer;
mod validate;

pub use transfer::*;
pub use validate::*;

use axum::{routing::{get, post}, Json, Router};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(rate: &RateLimitConfig) -> Router<AppState> {
    let limited = rate_limit::standard(
        Router::new()
            .route("/validate", post(validate_key))
            .route("/transfer/confirm", post(confirm_transfer)),
        rate.standard_rpm,
    );
    let health = rate_limit::relaxed(
        Router::new().route("/health", get(health)),
        rate.relaxed_rpm,
    );
    limited.merge(health)
}
