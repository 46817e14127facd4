use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// How a key expires.
///
/// `SingleUse` keys expire 24 hours after their first successful bind;
/// `Lifetime` keys never expire by time. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KeyType {
    SingleUse,
    Lifetime,
}

/// A license key record. Never physically deleted - revoked records remain
/// for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseKey {
    /// Opaque key code in `XXXXX-XXXXX-XXXXX-XXXXX` form
    pub key_code: String,
    pub key_type: KeyType,
    /// Bound hardware fingerprint; empty string = unbound
    pub hwid: String,
    /// 22-digit decimal fingerprint of `(hwid, key_code)`
    pub activation_id: String,
    /// Set at the moment of first successful bind
    pub activated_at: Option<i64>,
    pub revoked: bool,
    /// Purchaser address used by the ownership-transfer flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Salted hash of a pending transfer verification code
    #[serde(skip_serializing)]
    pub transfer_code_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_code_expires_at: Option<i64>,
    pub created_at: i64,
    /// Key code of the revoked record this one replaced, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reissued_from: Option<String>,
}

impl LicenseKey {
    /// A key is bound once its HWID field is non-empty.
    pub fn is_bound(&self) -> bool {
        !self.hwid.is_empty()
    }
}

/// Slim view of a freshly issued key, returned by issuance and pushed to
/// the notification webhook.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedKey {
    pub key_code: String,
    pub key_type: KeyType,
    pub activation_id: String,
}

impl From<&LicenseKey> for IssuedKey {
    fn from(key: &LicenseKey) -> Self {
        Self {
            key_code: key.key_code.clone(),
            key_type: key.key_type,
            activation_id: key.activation_id.clone(),
        }
    }
}
