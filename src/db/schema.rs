use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- License keys. Records are never deleted: revoked rows remain for
        -- audit, and reissue inserts a fresh row pointing back at the old
        -- one via reissued_from.
        CREATE TABLE IF NOT EXISTS license_keys (
            key_code TEXT PRIMARY KEY,
            key_type TEXT NOT NULL CHECK (key_type IN ('single_use', 'lifetime')),
            hwid TEXT NOT NULL DEFAULT '',
            activation_id TEXT NOT NULL,
            activated_at INTEGER,
            revoked INTEGER NOT NULL DEFAULT 0,
            email TEXT,
            transfer_code_hash TEXT,
            transfer_code_expires_at INTEGER,
            created_at INTEGER NOT NULL,
            reissued_from TEXT REFERENCES license_keys(key_code)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_license_keys_activation_id ON license_keys(activation_id);
        CREATE INDEX IF NOT EXISTS idx_license_keys_created ON license_keys(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_license_keys_transfer_expiry ON license_keys(transfer_code_expires_at) WHERE transfer_code_hash IS NOT NULL;
        "#,
    )?;
    Ok(())
}
