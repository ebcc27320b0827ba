//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Booleans are stored as 0/1 integers.

use chrono::{DateTime, SecondsFormat, Utc};
use keeper_core::account::Account;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> {
  dt.map(encode_dt)
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by every `SELECT` that produces a [`RawAccount`].
pub const ACCOUNT_COLUMNS: &str = "account_id, endpoint, username, email, \
  manager_email, password_changed_at, expires_at, is_disabled, is_archived, \
  last_checked";

/// Raw values read directly from an `accounts` row.
pub struct RawAccount {
  pub account_id:          String,
  pub endpoint:            String,
  pub username:            String,
  pub email:               String,
  pub manager_email:       String,
  pub password_changed_at: Option<String>,
  pub expires_at:          Option<String>,
  pub is_disabled:         bool,
  pub is_archived:         bool,
  pub last_checked:        String,
}

impl RawAccount {
  /// Read a row selected with [`ACCOUNT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:          row.get(0)?,
      endpoint:            row.get(1)?,
      username:            row.get(2)?,
      email:               row.get(3)?,
      manager_email:       row.get(4)?,
      password_changed_at: row.get(5)?,
      expires_at:          row.get(6)?,
      is_disabled:         row.get(7)?,
      is_archived:         row.get(8)?,
      last_checked:        row.get(9)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      account_id:          decode_uuid(&self.account_id)?,
      username:            self.username,
      endpoint:            self.endpoint,
      email:               self.email,
      manager_email:       self.manager_email,
      password_changed_at: decode_opt_dt(self.password_changed_at.as_deref())?,
      expires_at:          decode_opt_dt(self.expires_at.as_deref())?,
      is_disabled:         self.is_disabled,
      is_archived:         self.is_archived,
      last_checked:        decode_dt(&self.last_checked)?,
    })
  }
}

/// An [`Account`] encoded into column values, ready to bind as parameters.
pub struct EncodedAccount {
  pub account_id:          String,
  pub endpoint:            String,
  pub username:            String,
  pub email:               String,
  pub manager_email:       String,
  pub password_changed_at: Option<String>,
  pub expires_at:          Option<String>,
  pub is_disabled:         bool,
  pub last_checked:        String,
}

impl EncodedAccount {
  pub fn new(account: Account) -> Self {
    Self {
      account_id:          encode_uuid(account.account_id),
      password_changed_at: encode_opt_dt(account.password_changed_at),
      expires_at:          encode_opt_dt(account.expires_at),
      last_checked:        encode_dt(account.last_checked),
      endpoint:            account.endpoint,
      username:            account.username,
      email:               account.email,
      manager_email:       account.manager_email,
      is_disabled:         account.is_disabled,
    }
  }
}
