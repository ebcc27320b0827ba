//! The `AccountStore` trait and supporting batch/query types.
//!
//! The trait is implemented by storage backends (e.g. `keeper-store-sqlite`).
//! The reconciler and notification engine depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use crate::account::{Account, AccountKey, NewAccount};

// ─── Batch ───────────────────────────────────────────────────────────────────

/// A unit of work committed atomically by [`AccountStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct AccountBatch {
  /// Accounts seen for the first time.
  pub inserts: Vec<NewAccount>,
  /// Full replacement state for existing accounts, matched by `account_id`.
  /// Updates addressed at archived accounts are ignored by the store.
  pub updates: Vec<Account>,
}

impl AccountBatch {
  pub fn is_empty(&self) -> bool { self.inserts.is_empty() && self.updates.is_empty() }
}

/// What a committed batch actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
  pub inserted: usize,
  pub updated:  usize,
  /// Updates that matched no live row (unknown or archived account).
  pub ignored:  usize,
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for [`AccountStore::list_accounts`].
#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
  /// Restrict to one directory endpoint.
  pub endpoint:         Option<String>,
  pub include_archived: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Keeper account store backend.
///
/// Reads return owned snapshots. All writes go through [`commit`] (one
/// transaction per batch) or the administrative [`archive`] operation.
///
/// All methods return `Send` futures so the trait can be driven from a
/// multi-threaded tokio runtime.
///
/// [`commit`]: AccountStore::commit
/// [`archive`]: AccountStore::archive
pub trait AccountStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every account owned by `endpoint`, archived or not. Never returns
  /// records of another endpoint.
  fn accounts_for_endpoint<'a>(
    &'a self,
    endpoint: &'a str,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + 'a;

  /// Every account with `is_archived == false`, across all endpoints.
  fn active_accounts(
    &self,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + '_;

  /// Accounts matching `query`, ordered by endpoint then username.
  fn list_accounts<'a>(
    &'a self,
    query: &'a AccountQuery,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + 'a;

  /// Look up one account by its natural key. Returns `None` if not found.
  fn find_account<'a>(
    &'a self,
    key: &'a AccountKey,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist `batch` as a single all-or-nothing unit of work.
  ///
  /// Inserting a key that already exists fails the whole batch.
  fn commit(
    &self,
    batch: AccountBatch,
  ) -> impl Future<Output = Result<CommitSummary, Self::Error>> + Send + '_;

  /// Administrative archival: flip `is_archived` on a live account and return
  /// its archived state. Returns `None` if no live (unarchived) account has
  /// that key.
  fn archive<'a>(
    &'a self,
    key: &'a AccountKey,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;
}
