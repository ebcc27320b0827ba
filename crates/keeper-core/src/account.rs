//! Account types: the synchronized identity records Keeper tracks.
//!
//! A [`DirectoryRecord`] is what a directory endpoint reports right now. An
//! [`Account`] is the persisted state the store keeps for one
//! `(endpoint, username)` pair across reconciliation passes.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Expiration sentinel ─────────────────────────────────────────────────────

/// Directories encode "never expires" as the largest date they can represent.
/// Any expiration at or after this instant is treated as no expiration.
pub fn never_expires_threshold() -> DateTime<Utc> {
  Utc
    .with_ymd_and_hms(9999, 12, 31, 0, 0, 0)
    .single()
    .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Drop the "never" sentinel, leaving only a real expiration date.
pub fn effective_expiration(
  expires_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
  expires_at.filter(|at| *at < never_expires_threshold())
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The composite natural key of an account. Usernames are only unique within
/// the endpoint that reported them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey {
  pub endpoint: String,
  pub username: String,
}

impl AccountKey {
  pub fn new(endpoint: impl Into<String>, username: impl Into<String>) -> Self {
    Self { endpoint: endpoint.into(), username: username.into() }
  }
}

impl std::fmt::Display for AccountKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}@{}", self.username, self.endpoint)
  }
}

// ─── Directory record ────────────────────────────────────────────────────────

/// One account as reported by a directory endpoint.
///
/// Carries no endpoint; the reconciler stamps the endpoint it fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
  pub username:            String,
  #[serde(default)]
  pub email:               String,
  #[serde(default)]
  pub manager_email:       String,
  #[serde(default)]
  pub password_changed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub expires_at:          Option<DateTime<Utc>>,
  #[serde(default)]
  pub is_disabled:         bool,
}

impl DirectoryRecord {
  /// Convenience constructor with every optional field empty.
  pub fn new(username: impl Into<String>) -> Self {
    Self {
      username:            username.into(),
      email:               String::new(),
      manager_email:       String::new(),
      password_changed_at: None,
      expires_at:          None,
      is_disabled:         false,
    }
  }

  /// A record is usable only if it has a non-blank username.
  pub fn validate(&self) -> Result<()> {
    if self.username.trim().is_empty() {
      return Err(Error::EmptyUsername);
    }
    Ok(())
  }
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// The persisted state of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  /// Store-assigned identifier; never changes after creation.
  pub account_id:          Uuid,
  pub username:            String,
  /// The directory endpoint that owns this record.
  pub endpoint:            String,
  pub email:               String,
  /// Empty when the directory has no manager on file.
  pub manager_email:       String,
  pub password_changed_at: Option<DateTime<Utc>>,
  /// The "never" sentinel is dropped on write; see [`Account::expiration`].
  pub expires_at:          Option<DateTime<Utc>>,
  pub is_disabled:         bool,
  /// Archived accounts are frozen: no reconciliation updates and no
  /// notifications.
  pub is_archived:         bool,
  pub last_checked:        DateTime<Utc>,
}

impl Account {
  pub fn key(&self) -> AccountKey {
    AccountKey::new(self.endpoint.clone(), self.username.clone())
  }

  /// The expiration date, if an expiration policy applies at all.
  pub fn expiration(&self) -> Option<DateTime<Utc>> {
    effective_expiration(self.expires_at)
  }

  /// The courtesy-copy recipient, if the directory knows a manager.
  pub fn manager(&self) -> Option<&str> {
    Some(self.manager_email.trim()).filter(|m| !m.is_empty())
  }

  /// Overwrite the directory-owned fields with a fresh record and advance
  /// `last_checked`. Never touches `is_archived`.
  pub fn refresh(&mut self, record: DirectoryRecord, checked_at: DateTime<Utc>) {
    self.email = record.email;
    self.manager_email = record.manager_email;
    self.password_changed_at = record.password_changed_at;
    self.expires_at = effective_expiration(record.expires_at);
    self.is_disabled = record.is_disabled;
    self.last_checked = self.last_checked.max(checked_at);
  }
}

// ─── NewAccount ──────────────────────────────────────────────────────────────

/// Input for inserting an account seen for the first time.
/// `account_id` is always assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
  pub endpoint:            String,
  pub username:            String,
  pub email:               String,
  pub manager_email:       String,
  pub password_changed_at: Option<DateTime<Utc>>,
  pub expires_at:          Option<DateTime<Utc>>,
  pub is_disabled:         bool,
  pub checked_at:          DateTime<Utc>,
}

impl NewAccount {
  pub fn from_record(
    endpoint: impl Into<String>,
    record: DirectoryRecord,
    checked_at: DateTime<Utc>,
  ) -> Self {
    Self {
      endpoint: endpoint.into(),
      username: record.username,
      email: record.email,
      manager_email: record.manager_email,
      password_changed_at: record.password_changed_at,
      expires_at: effective_expiration(record.expires_at),
      is_disabled: record.is_disabled,
      checked_at,
    }
  }

  pub fn key(&self) -> AccountKey {
    AccountKey::new(self.endpoint.clone(), self.username.clone())
  }

  /// Materialise the account the store will persist under `account_id`.
  pub fn into_account(self, account_id: Uuid) -> Account {
    Account {
      account_id,
      username: self.username,
      endpoint: self.endpoint,
      email: self.email,
      manager_email: self.manager_email,
      password_changed_at: self.password_changed_at,
      expires_at: self.expires_at,
      is_disabled: self.is_disabled,
      is_archived: false,
      last_checked: self.checked_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn sentinel_expiration_is_ignored() {
    let now = Utc::now();
    assert_eq!(effective_expiration(Some(DateTime::<Utc>::MAX_UTC)), None);
    assert_eq!(effective_expiration(Some(never_expires_threshold())), None);
    assert_eq!(
      effective_expiration(Some(now + Duration::days(10))),
      Some(now + Duration::days(10))
    );
    assert_eq!(effective_expiration(None), None);
  }

  #[test]
  fn blank_username_is_invalid() {
    assert!(matches!(
      DirectoryRecord::new("   ").validate(),
      Err(Error::EmptyUsername)
    ));
    assert!(DirectoryRecord::new("jdoe").validate().is_ok());
  }

  #[test]
  fn refresh_keeps_archive_flag_and_never_moves_last_checked_back() {
    let now = Utc::now();
    let mut account = NewAccount::from_record("e1", DirectoryRecord::new("a"), now)
      .into_account(Uuid::new_v4());
    account.is_archived = true;

    let mut record = DirectoryRecord::new("a");
    record.email = "a@example.com".into();
    record.is_disabled = true;
    account.refresh(record, now - Duration::hours(1));

    assert!(account.is_archived);
    assert!(account.is_disabled);
    assert_eq!(account.email, "a@example.com");
    assert_eq!(account.last_checked, now);
  }

  #[test]
  fn manager_is_none_when_blank() {
    let mut account =
      NewAccount::from_record("e1", DirectoryRecord::new("a"), Utc::now())
        .into_account(Uuid::new_v4());
    assert_eq!(account.manager(), None);
    account.manager_email = "boss@example.com".into();
    assert_eq!(account.manager(), Some("boss@example.com"));
  }
}
