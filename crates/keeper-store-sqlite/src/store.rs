//! [`SqliteStore`], the SQLite implementation of [`AccountStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use keeper_core::{
  account::{Account, AccountKey},
  store::{AccountBatch, AccountQuery, AccountStore, CommitSummary},
};

use crate::{
  Result,
  encode::{ACCOUNT_COLUMNS, EncodedAccount, RawAccount},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Keeper account store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a `SELECT` over [`ACCOUNT_COLUMNS`] with the given tail clause and
  /// positional parameters.
  async fn select_accounts(
    &self,
    tail: &'static str,
    params: Vec<Option<String>>,
  ) -> Result<Vec<Account>> {
    let raws: Vec<RawAccount> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAccount::into_account).collect()
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  type Error = crate::Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn accounts_for_endpoint(&self, endpoint: &str) -> Result<Vec<Account>> {
    self
      .select_accounts(
        "WHERE endpoint = ?1 ORDER BY username",
        vec![Some(endpoint.to_owned())],
      )
      .await
  }

  async fn active_accounts(&self) -> Result<Vec<Account>> {
    self
      .select_accounts("WHERE is_archived = 0 ORDER BY endpoint, username", vec![])
      .await
  }

  async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
    let tail = if query.include_archived {
      "WHERE (?1 IS NULL OR endpoint = ?1) ORDER BY endpoint, username"
    } else {
      "WHERE (?1 IS NULL OR endpoint = ?1) AND is_archived = 0
       ORDER BY endpoint, username"
    };
    self.select_accounts(tail, vec![query.endpoint.clone()]).await
  }

  async fn find_account(&self, key: &AccountKey) -> Result<Option<Account>> {
    let endpoint = key.endpoint.clone();
    let username = key.username.clone();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE endpoint = ?1 AND username = ?2"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![endpoint, username], RawAccount::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn commit(&self, batch: AccountBatch) -> Result<CommitSummary> {
    if batch.is_empty() {
      return Ok(CommitSummary::default());
    }

    let inserts: Vec<EncodedAccount> = batch
      .inserts
      .into_iter()
      .map(|new| EncodedAccount::new(new.into_account(Uuid::new_v4())))
      .collect();
    let updates: Vec<EncodedAccount> =
      batch.updates.into_iter().map(EncodedAccount::new).collect();

    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut summary = CommitSummary::default();
        {
          let mut insert = tx.prepare(
            "INSERT INTO accounts (
               account_id, endpoint, username, email, manager_email,
               password_changed_at, expires_at, is_disabled, is_archived,
               last_checked
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
          )?;
          for row in &inserts {
            insert.execute(rusqlite::params![
              row.account_id,
              row.endpoint,
              row.username,
              row.email,
              row.manager_email,
              row.password_changed_at,
              row.expires_at,
              row.is_disabled,
              row.last_checked,
            ])?;
            summary.inserted += 1;
          }

          // Archived rows are frozen; the guard makes such updates no-ops.
          let mut update = tx.prepare(
            "UPDATE accounts SET
               email = ?2, manager_email = ?3, password_changed_at = ?4,
               expires_at = ?5, is_disabled = ?6, last_checked = ?7
             WHERE account_id = ?1 AND is_archived = 0",
          )?;
          for row in &updates {
            let changed = update.execute(rusqlite::params![
              row.account_id,
              row.email,
              row.manager_email,
              row.password_changed_at,
              row.expires_at,
              row.is_disabled,
              row.last_checked,
            ])?;
            if changed == 0 {
              summary.ignored += 1;
            } else {
              summary.updated += changed;
            }
          }
        }
        tx.commit()?;
        Ok(summary)
      })
      .await?;

    tracing::debug!(
      inserted = summary.inserted,
      updated = summary.updated,
      ignored = summary.ignored,
      "committed account batch"
    );
    Ok(summary)
  }

  async fn archive(&self, key: &AccountKey) -> Result<Option<Account>> {
    let endpoint = key.endpoint.clone();
    let username = key.username.clone();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE accounts SET is_archived = 1
           WHERE endpoint = ?1 AND username = ?2 AND is_archived = 0",
          rusqlite::params![endpoint, username],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let sql = format!(
          "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE endpoint = ?1 AND username = ?2"
        );
        let raw = tx.query_row(
          &sql,
          rusqlite::params![endpoint, username],
          RawAccount::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }
}
