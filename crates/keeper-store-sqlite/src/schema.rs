//! SQL schema for the Keeper SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (endpoint, username). Rows are never deleted.
CREATE TABLE IF NOT EXISTS accounts (
    account_id          TEXT PRIMARY KEY,
    endpoint            TEXT NOT NULL,
    username            TEXT NOT NULL CHECK (username != ''),
    email               TEXT NOT NULL DEFAULT '',
    manager_email       TEXT NOT NULL DEFAULT '',
    password_changed_at TEXT,             -- ISO 8601 UTC or NULL
    expires_at          TEXT,             -- ISO 8601 UTC or NULL (never expires)
    is_disabled         INTEGER NOT NULL DEFAULT 0,
    is_archived         INTEGER NOT NULL DEFAULT 0,
    last_checked        TEXT NOT NULL,    -- ISO 8601 UTC; refreshed on every sync
    UNIQUE (endpoint, username)
);

CREATE INDEX IF NOT EXISTS accounts_endpoint_idx ON accounts(endpoint);
CREATE INDEX IF NOT EXISTS accounts_archived_idx ON accounts(is_archived);

PRAGMA user_version = 1;
";
