//! Key lifecycle evaluation.
//!
//! The lifecycle is strictly forward-moving: unbound -> bound ->
//! (expired | revoked). Expiry is a read-time classification, not a stored
//! state - a `single_use` key that has passed its window is evaluated as
//! expired on each check rather than transitioned by a background process.
//!
//! [`evaluate`] is the pure decision function behind `POST /validate`; the
//! handler owns the one mutating step (the first bind) and the store makes
//! that step atomic.

use crate::keygen;
use crate::models::{KeyType, LicenseKey};

/// Window after first bind during which a `single_use` key stays valid.
pub const SINGLE_USE_TTL_SECS: i64 = 24 * 60 * 60;

/// Validity of a pending ownership-transfer verification code.
pub const TRANSFER_CODE_TTL_SECS: i64 = 24 * 60 * 60;

/// Outcome of evaluating a key against a presented HWID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Key is revoked; the client must discard cached credentials
    Revoked,
    /// Key is bound to a different device
    DeviceMismatch,
    /// Stored activation id no longer matches the recomputation - the
    /// record was regenerated server-side; client must resynchronize
    Stale,
    /// `single_use` key past its 24h window
    Expired,
    /// Bound to this device and inside its window
    Valid,
    /// Unbound - the caller must perform the first bind
    NeedsBind,
}

/// Evaluate a key record against the HWID presented by a client.
///
/// Pure with respect to the record: the `NeedsBind` outcome tells the
/// caller to run the atomic bind step, every other outcome is final for
/// this request.
pub fn evaluate(key: &LicenseKey, hwid: &str, now: i64) -> Decision {
    if key.revoked {
        return Decision::Revoked;
    }

    if !key.is_bound() {
        return Decision::NeedsBind;
    }

    if key.hwid != hwid {
        return Decision::DeviceMismatch;
    }

    let expected = keygen::activation_id(&key.hwid, &key.key_code);
    if key.activation_id != expected {
        return Decision::Stale;
    }

    if key.key_type == KeyType::SingleUse {
        // A bound single_use key without an activation time cannot prove
        // its window is still open; treat it as expired.
        let Some(activated_at) = key.activated_at else {
            return Decision::Expired;
        };
        if now > activated_at + SINGLE_USE_TTL_SECS {
            return Decision::Expired;
        }
    }

    Decision::Valid
}
