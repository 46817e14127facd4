//! Key code and activation id generation.
//!
//! Key codes are opaque strings in the form `XXXXX-XXXXX-XXXXX-XXXXX`, four
//! groups of five characters from `[A-Z0-9]` (~103 bits of entropy). The
//! activation id is a deterministic 22-digit decimal fingerprint of
//! `(hwid, key_code)`, recomputed and compared on every validation: a stored
//! id that no longer matches the recomputation signals the record was
//! regenerated server-side since the client last synced.

use sha2::{Digest, Sha256};

const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const KEY_GROUPS: usize = 4;
const KEY_GROUP_LEN: usize = 5;

/// Number of decimal digits in an activation id.
pub const ACTIVATION_ID_LEN: usize = 22;

/// Length of a 6-digit ownership-transfer verification code.
const TRANSFER_CODE_LEN: usize = 6;

/// Generate a fresh random key code: `XXXXX-XXXXX-XXXXX-XXXXX`.
pub fn generate_key_code() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    let mut group = || -> String {
        (0..KEY_GROUP_LEN)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect()
    };

    let groups: Vec<String> = (0..KEY_GROUPS).map(|_| group()).collect();
    groups.join("-")
}

/// Validate the shape of a key code without touching the database.
///
/// Matches `^[A-Z0-9]{5}(-[A-Z0-9]{5}){3}$`.
pub fn is_valid_key_code(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == KEY_GROUPS
        && parts.iter().all(|p| {
            p.len() == KEY_GROUP_LEN
                && p.bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
}

/// Compute the activation id for a `(hwid, key_code)` pair:
/// `SHA256(hwid || key_code) mod 10^22`, zero-padded to 22 digits.
///
/// An unbound key uses the empty string as its HWID.
pub fn activation_id(hwid: &str, key_code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hwid.as_bytes());
    hasher.update(key_code.as_bytes());
    let digest = hasher.finalize();

    // Reduce the 256-bit digest mod 10^22 by folding bytes left to right.
    // The accumulator stays below 10^22 (< 2^74), so acc * 256 + byte fits
    // comfortably in a u128.
    const MODULUS: u128 = 10u128.pow(22);
    let mut acc: u128 = 0;
    for byte in digest {
        acc = (acc * 256 + byte as u128) % MODULUS;
    }

    format!("{:0>width$}", acc, width = ACTIVATION_ID_LEN)
}

/// Cheap shape check for activation ids (22 decimal digits).
pub fn is_valid_activation_id(s: &str) -> bool {
    s.len() == ACTIVATION_ID_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

/// Generate a 6-digit numeric ownership-transfer verification code.
pub fn generate_transfer_code() -> String {
    use rand::Rng;
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

/// Hash a secret for database storage (transfer verification codes).
/// Uses SHA-256 with an application salt, returns lowercase hex.
pub fn hash_code(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"keygate-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
