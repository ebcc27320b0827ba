//! Reconciliation: a fresh directory snapshot → one batch of store operations.
//!
//! [`plan`] is pure: it diffs the snapshot against the accounts the store
//! already holds for the same endpoint. [`reconcile`] loads those accounts,
//! plans, and commits the batch in one unit of work.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use keeper_core::{
  account::{Account, AccountKey, DirectoryRecord, NewAccount},
  store::{AccountBatch, AccountStore},
};

use crate::{Error, Result};

/// The store operations needed to bring one endpoint up to date.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
  pub batch:      AccountBatch,
  /// Records dropped for having no username.
  pub malformed:  usize,
  /// Records that repeated a username already seen in the same snapshot.
  pub duplicates: usize,
  /// Archived accounts present in the snapshot and left untouched.
  pub frozen:     usize,
}

/// Outcome of reconciling one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  pub endpoint:   String,
  pub fetched:    usize,
  pub inserted:   usize,
  pub updated:    usize,
  pub malformed:  usize,
  pub duplicates: usize,
  pub frozen:     usize,
}

/// Compute the batch that merges `snapshot` into `existing` for `endpoint`.
///
/// Existing accounts of other endpoints are ignored. Within the snapshot the
/// last record for a username wins. Accounts missing from the snapshot are
/// not touched.
pub fn plan(
  endpoint: &str,
  snapshot: Vec<DirectoryRecord>,
  existing: Vec<Account>,
  now: DateTime<Utc>,
) -> ReconcilePlan {
  let mut known: HashMap<AccountKey, Account> = existing
    .into_iter()
    .filter(|a| a.endpoint == endpoint)
    .map(|a| (a.key(), a))
    .collect();

  let mut result = ReconcilePlan::default();

  // First-seen order of keys, with the latest record for each.
  let mut order: Vec<AccountKey> = Vec::new();
  let mut latest: HashMap<AccountKey, DirectoryRecord> = HashMap::new();

  for record in snapshot {
    if let Err(e) = record.validate() {
      tracing::warn!(endpoint, error = %e, "skipping malformed directory record");
      result.malformed += 1;
      continue;
    }
    let key = AccountKey::new(endpoint, record.username.clone());
    if latest.insert(key.clone(), record).is_some() {
      tracing::warn!(endpoint, username = %key.username, "duplicate username in snapshot; keeping the last record");
      result.duplicates += 1;
    } else {
      order.push(key);
    }
  }

  for key in order {
    let Some(record) = latest.remove(&key) else { continue };
    match known.remove(&key) {
      Some(account) if account.is_archived => {
        tracing::debug!(endpoint, username = %key.username, "account is archived; leaving it untouched");
        result.frozen += 1;
      }
      Some(mut account) => {
        tracing::debug!(endpoint, username = %key.username, "updating existing account");
        account.refresh(record, now);
        result.batch.updates.push(account);
      }
      None => {
        tracing::debug!(endpoint, username = %key.username, "adding new account");
        result.batch.inserts.push(NewAccount::from_record(endpoint, record, now));
      }
    }
  }

  result
}

/// Merge `snapshot` into `store` for `endpoint` and commit it as one batch.
///
/// Only accounts owned by `endpoint` are read or written.
pub async fn reconcile<S: AccountStore>(
  endpoint: &str,
  snapshot: Vec<DirectoryRecord>,
  store: &S,
  now: DateTime<Utc>,
) -> Result<ReconcileReport> {
  let fetched = snapshot.len();
  let existing = store
    .accounts_for_endpoint(endpoint)
    .await
    .map_err(Error::store)?;
  tracing::debug!(endpoint, existing = existing.len(), fetched, "reconciling endpoint");

  let plan = plan(endpoint, snapshot, existing, now);
  let summary = store.commit(plan.batch).await.map_err(Error::store)?;

  Ok(ReconcileReport {
    endpoint: endpoint.to_owned(),
    fetched,
    inserted: summary.inserted,
    updated: summary.updated,
    malformed: plan.malformed,
    duplicates: plan.duplicates,
    frozen: plan.frozen,
  })
}
