//! Out-of-band delivery of issued keys and transfer codes.
//!
//! When `KEYGATE_NOTIFY_WEBHOOK_URL` is configured, Keygate POSTs an event
//! for every issued key batch and every transfer verification code; a chat
//! relay or mailer on the receiving end handles actual delivery. The core
//! never depends on delivery succeeding: failures are reported (logged or
//! surfaced as `sent: false`), never retried across requests, and never
//! roll back the operation that triggered them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::IssuedKey;

/// Retry delays in milliseconds for webhook delivery. Quick retries only,
/// to avoid blocking the request that triggered the event.
const NOTIFY_RETRY_DELAYS: &[u64] = &[100, 200];

/// Per-attempt request timeout.
const NOTIFY_TIMEOUT_SECS: u64 = 5;

/// What happened to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyResult {
    /// The webhook accepted the event
    Sent,
    /// No webhook URL is configured
    Disabled,
}

/// Event pushed when keys are issued (manually or via reissue).
#[derive(Debug, Serialize)]
struct KeysIssuedEvent<'a> {
    event: &'static str,
    keys: &'a [IssuedKey],
    timestamp: i64,
    /// Unique per event so the receiver can deduplicate our retries
    idempotency_key: String,
}

/// Event pushed when an ownership-transfer code is requested.
#[derive(Debug, Serialize)]
struct TransferCodeEvent<'a> {
    event: &'static str,
    email: &'a str,
    key_code: &'a str,
    code: &'a str,
    expires_at: i64,
    timestamp: i64,
    idempotency_key: String,
}

/// Webhook-backed notifier. With no URL configured every notification
/// resolves to `Disabled`, which keeps dev setups and tests silent.
pub struct Notifier {
    webhook_url: Option<String>,
    http_client: Client,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            http_client: Client::new(),
        }
    }

    /// Push an issued-key batch to the webhook.
    pub async fn keys_issued(&self, keys: &[IssuedKey]) -> Result<NotifyResult> {
        let event = KeysIssuedEvent {
            event: "keys_issued",
            keys,
            timestamp: chrono::Utc::now().timestamp(),
            idempotency_key: uuid::Uuid::new_v4().to_string(),
        };
        self.post_event(&event).await
    }

    /// Push a transfer verification code for delivery to the registered
    /// email address.
    pub async fn transfer_code(
        &self,
        email: &str,
        key_code: &str,
        code: &str,
        expires_at: i64,
    ) -> Result<NotifyResult> {
        let event = TransferCodeEvent {
            event: "transfer_code",
            email,
            key_code,
            code,
            expires_at,
            timestamp: chrono::Utc::now().timestamp(),
            idempotency_key: uuid::Uuid::new_v4().to_string(),
        };
        self.post_event(&event).await
    }

    /// POST an event with short bounded retries on transient failures.
    async fn post_event<T: Serialize>(&self, event: &T) -> Result<NotifyResult> {
        let Some(ref url) = self.webhook_url else {
            return Ok(NotifyResult::Disabled);
        };

        let mut last_error = String::new();

        for (attempt, delay_ms) in std::iter::once(&0u64)
            .chain(NOTIFY_RETRY_DELAYS)
            .enumerate()
        {
            if *delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            }

            let response = self
                .http_client
                .post(url)
                .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
                .json(event)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => return Ok(NotifyResult::Sent),
                Ok(resp) => {
                    last_error = format!("webhook returned {}", resp.status());
                    // Client errors won't improve on retry
                    if resp.status().is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            tracing::debug!(attempt, error = %last_error, "Notification attempt failed");
        }

        Err(AppError::Internal(format!(
            "Notification delivery failed: {}",
            last_error
        )))
    }
}

/// Fire-and-forget delivery of an issued-key batch.
///
/// Spawned so issuance latency never includes the webhook round-trip; a
/// panic inside the notifier is contained to the spawned task.
pub fn spawn_key_notification(notifier: Arc<Notifier>, keys: Vec<IssuedKey>) {
    tokio::spawn(async move {
        let result = AssertUnwindSafe(notifier.keys_issued(&keys))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(NotifyResult::Sent)) => {
                tracing::debug!(count = keys.len(), "Issued-key notification delivered");
            }
            Ok(Ok(NotifyResult::Disabled)) => {}
            Ok(Err(e)) => {
                tracing::warn!(count = keys.len(), error = %e, "Issued-key notification failed");
            }
            Err(_) => {
                tracing::error!("Issued-key notification task panicked");
            }
        }
    });
}
