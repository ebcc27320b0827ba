//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Duration, Utc};
use keeper_core::{
  account::{AccountKey, DirectoryRecord, NewAccount},
  store::{AccountBatch, AccountQuery, AccountStore},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_account(endpoint: &str, username: &str, now: DateTime<Utc>) -> NewAccount {
  let mut record = DirectoryRecord::new(username);
  record.email = format!("{username}@example.com");
  record.expires_at = Some(now + Duration::days(10));
  NewAccount::from_record(endpoint, record, now)
}

fn inserts(accounts: Vec<NewAccount>) -> AccountBatch {
  AccountBatch { inserts: accounts, updates: vec![] }
}

// ─── Inserts and reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn commit_inserts_and_reads_back() {
  let s = store().await;
  let now = Utc::now();

  let summary = s
    .commit(inserts(vec![new_account("e1", "alice", now)]))
    .await
    .unwrap();
  assert_eq!(summary.inserted, 1);

  let accounts = s.accounts_for_endpoint("e1").await.unwrap();
  assert_eq!(accounts.len(), 1);
  let alice = &accounts[0];
  assert_eq!(alice.username, "alice");
  assert_eq!(alice.email, "alice@example.com");
  assert_eq!(alice.expires_at, Some(now + Duration::days(10)));
  assert_eq!(alice.last_checked, now);
  assert!(!alice.is_archived);
  assert!(!alice.is_disabled);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
  let s = store().await;
  let summary = s.commit(AccountBatch::default()).await.unwrap();
  assert_eq!(summary.inserted + summary.updated + summary.ignored, 0);
}

#[tokio::test]
async fn accounts_for_endpoint_is_scoped() {
  let s = store().await;
  let now = Utc::now();
  s.commit(inserts(vec![
    new_account("e1", "alice", now),
    new_account("e2", "alice", now),
    new_account("e2", "bob", now),
  ]))
  .await
  .unwrap();

  let e1 = s.accounts_for_endpoint("e1").await.unwrap();
  assert_eq!(e1.len(), 1);
  assert!(e1.iter().all(|a| a.endpoint == "e1"));

  let e2 = s.accounts_for_endpoint("e2").await.unwrap();
  assert_eq!(e2.len(), 2);
}

#[tokio::test]
async fn find_account_by_key() {
  let s = store().await;
  let now = Utc::now();
  s.commit(inserts(vec![new_account("e1", "alice", now)]))
    .await
    .unwrap();

  let found = s
    .find_account(&AccountKey::new("e1", "alice"))
    .await
    .unwrap();
  assert!(found.is_some());

  let missing = s
    .find_account(&AccountKey::new("e2", "alice"))
    .await
    .unwrap();
  assert!(missing.is_none());
}

// ─── Batch atomicity ─────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_key_fails_whole_batch() {
  let s = store().await;
  let now = Utc::now();
  s.commit(inserts(vec![new_account("e1", "alice", now)]))
    .await
    .unwrap();

  let err = s
    .commit(inserts(vec![
      new_account("e1", "bob", now),
      new_account("e1", "alice", now),
    ]))
    .await;
  assert!(matches!(err, Err(crate::Error::Database(_))));

  // bob was rolled back with the rest of the batch.
  let accounts = s.accounts_for_endpoint("e1").await.unwrap();
  assert_eq!(accounts.len(), 1);
  assert_eq!(accounts[0].username, "alice");
}

#[tokio::test]
async fn update_overwrites_fields() {
  let s = store().await;
  let now = Utc::now();
  s.commit(inserts(vec![new_account("e1", "alice", now)]))
    .await
    .unwrap();

  let mut alice = s.accounts_for_endpoint("e1").await.unwrap().remove(0);
  alice.is_disabled = true;
  alice.manager_email = "boss@example.com".into();
  alice.expires_at = None;
  alice.last_checked = now + Duration::minutes(5);

  let summary = s
    .commit(AccountBatch { inserts: vec![], updates: vec![alice.clone()] })
    .await
    .unwrap();
  assert_eq!(summary.updated, 1);

  let reread = s
    .find_account(&alice.key())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(reread, alice);
}

// ─── Archival ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn archive_freezes_account() {
  let s = store().await;
  let now = Utc::now();
  s.commit(inserts(vec![
    new_account("e1", "alice", now),
    new_account("e1", "bob", now),
  ]))
  .await
  .unwrap();

  let key = AccountKey::new("e1", "alice");
  let archived = s.archive(&key).await.unwrap().unwrap();
  assert!(archived.is_archived);

  // A second archive finds no live account.
  assert!(s.archive(&key).await.unwrap().is_none());

  // Updates aimed at an archived row are ignored.
  let mut stale = archived.clone();
  stale.is_disabled = true;
  let summary = s
    .commit(AccountBatch { inserts: vec![], updates: vec![stale] })
    .await
    .unwrap();
  assert_eq!(summary.ignored, 1);
  assert_eq!(s.find_account(&key).await.unwrap().unwrap(), archived);

  let active = s.active_accounts().await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].username, "bob");
}

#[tokio::test]
async fn archive_unknown_account_is_none() {
  let s = store().await;
  let result = s.archive(&AccountKey::new("e1", "ghost")).await.unwrap();
  assert!(result.is_none());
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_accounts_filters() {
  let s = store().await;
  let now = Utc::now();
  s.commit(inserts(vec![
    new_account("e1", "alice", now),
    new_account("e1", "bob", now),
    new_account("e2", "carol", now),
  ]))
  .await
  .unwrap();
  s.archive(&AccountKey::new("e1", "bob")).await.unwrap();

  let all = s
    .list_accounts(&AccountQuery { endpoint: None, include_archived: true })
    .await
    .unwrap();
  let names: Vec<_> = all.iter().map(|a| a.username.as_str()).collect();
  assert_eq!(names, ["alice", "bob", "carol"]);

  let live = s.list_accounts(&AccountQuery::default()).await.unwrap();
  assert_eq!(live.len(), 2);

  let e1_live = s
    .list_accounts(&AccountQuery {
      endpoint:         Some("e1".into()),
      include_archived: false,
    })
    .await
    .unwrap();
  assert_eq!(e1_live.len(), 1);
  assert_eq!(e1_live[0].username, "alice");
}

#[tokio::test]
async fn reopen_file_store_keeps_accounts() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("accounts.db");
  let now = Utc::now();

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.commit(inserts(vec![new_account("e1", "alice", now)]))
      .await
      .unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.accounts_for_endpoint("e1").await.unwrap().len(), 1);
}
