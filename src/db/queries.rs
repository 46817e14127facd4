use chrono::Utc;
use rusqlite::{Connection, ErrorCode, params};

use crate::error::{AppError, Result};
use crate::keygen;
use crate::models::{KeyType, LicenseKey};

use super::from_row::{LICENSE_KEY_COLS, query_all, query_one};

/// Attempts before giving up on generating a key code the store will
/// accept. Collisions over a 36^20 space are a birthday curiosity, but a
/// uniqueness violation is retried rather than surfaced as a failure.
const KEY_GENERATION_ATTEMPTS: usize = 5;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Insert a freshly generated, unbound key record.
///
/// The activation id is computed over the empty HWID; `email` and
/// `reissued_from` carry transfer/reissue provenance.
pub fn insert_new_key(
    conn: &Connection,
    key_type: KeyType,
    email: Option<&str>,
    reissued_from: Option<&str>,
) -> Result<LicenseKey> {
    let created_at = now();

    for _ in 0..KEY_GENERATION_ATTEMPTS {
        let key_code = keygen::generate_key_code();
        let activation_id = keygen::activation_id("", &key_code);

        let inserted = conn.execute(
            "INSERT INTO license_keys (key_code, key_type, hwid, activation_id, activated_at, revoked, email, created_at, reissued_from)
             VALUES (?1, ?2, '', ?3, NULL, 0, ?4, ?5, ?6)",
            params![&key_code, key_type.as_ref(), &activation_id, email, created_at, reissued_from],
        );

        match inserted {
            Ok(_) => {
                return Ok(LicenseKey {
                    key_code,
                    key_type,
                    hwid: String::new(),
                    activation_id,
                    activated_at: None,
                    revoked: false,
                    email: email.map(String::from),
                    transfer_code_hash: None,
                    transfer_code_expires_at: None,
                    created_at,
                    reissued_from: reissued_from.map(String::from),
                });
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!("Generated key code collided, retrying");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(format!(
        "Could not generate a unique key code in {} attempts",
        KEY_GENERATION_ATTEMPTS
    )))
}

pub fn get_key_by_code(conn: &Connection, key_code: &str) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_keys WHERE key_code = ?1",
            LICENSE_KEY_COLS
        ),
        &[&key_code],
    )
}

/// Look up a record by key code or activation id - admin operations accept
/// either identifier on a single field.
pub fn find_key(conn: &Connection, ident: &str) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_keys WHERE key_code = ?1 OR activation_id = ?1",
            LICENSE_KEY_COLS
        ),
        &[&ident],
    )
}

/// List records newest first, including revoked ones, with the total count.
pub fn list_keys(conn: &Connection, limit: i64, offset: i64) -> Result<(Vec<LicenseKey>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM license_keys", [], |row| row.get(0))?;

    let keys = query_all(
        conn,
        &format!(
            "SELECT {} FROM license_keys ORDER BY created_at DESC, key_code LIMIT ?1 OFFSET ?2",
            LICENSE_KEY_COLS
        ),
        &[&limit, &offset],
    )?;

    Ok((keys, total))
}

/// Atomically bind an unbound key to a device.
///
/// The update only succeeds if the record is still unbound and not
/// revoked, so two simultaneous first validations cannot both win: the
/// loser sees 0 rows affected, re-reads, and is evaluated against the
/// winner's binding.
pub fn try_bind_key(
    conn: &Connection,
    key_code: &str,
    hwid: &str,
    activation_id: &str,
    activated_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE license_keys SET hwid = ?2, activation_id = ?3, activated_at = ?4
         WHERE key_code = ?1 AND hwid = '' AND revoked = 0",
        params![key_code, hwid, activation_id, activated_at],
    )?;
    Ok(affected > 0)
}

/// Revoke a key in place and mint its unbound replacement in one
/// transaction. The old record is never deleted; any pending transfer code
/// on it is cleared.
pub fn reissue_key(
    conn: &mut Connection,
    old_key_code: &str,
    new_type: KeyType,
    email: Option<&str>,
) -> Result<LicenseKey> {
    let tx = conn.transaction()?;

    let affected = tx.execute(
        "UPDATE license_keys SET revoked = 1, transfer_code_hash = NULL, transfer_code_expires_at = NULL
         WHERE key_code = ?1",
        params![old_key_code],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound("Key not found".into()));
    }

    let new_key = insert_new_key(&tx, new_type, email, Some(old_key_code))?;

    tx.commit()?;
    Ok(new_key)
}

/// Store a pending ownership-transfer code (salted hash) and the
/// registered email on a record, overwriting any previous pending code.
pub fn set_transfer_code(
    conn: &Connection,
    key_code: &str,
    code_hash: &str,
    expires_at: i64,
    email: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE license_keys SET transfer_code_hash = ?2, transfer_code_expires_at = ?3, email = ?4
         WHERE key_code = ?1",
        params![key_code, code_hash, expires_at, email],
    )?;
    Ok(affected > 0)
}

/// Clear expired pending transfer codes. Keys themselves are untouched -
/// expiry of `single_use` keys stays a read-time classification.
pub fn cleanup_expired_transfer_codes(conn: &Connection) -> Result<usize> {
    let cleared = conn.execute(
        "UPDATE license_keys SET transfer_code_hash = NULL, transfer_code_expires_at = NULL
         WHERE transfer_code_hash IS NOT NULL AND transfer_code_expires_at < ?1",
        params![now()],
    )?;
    Ok(cleared)
}

pub fn count_keys(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM license_keys", [], |row| row.get(0))
        .map_err(Into::into)
}
