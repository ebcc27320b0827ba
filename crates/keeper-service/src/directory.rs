//! Directory sources shipped with the service.
//!
//! The directory protocol itself lives outside Keeper. These sources read
//! snapshots that something else produced ([`SnapshotDirectory`]) or serve a
//! fixed demo population ([`FixtureDirectory`]).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use keeper_core::{account::DirectoryRecord, directory::DirectorySource};
use serde::Deserialize;

use crate::{Error, Result};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Which directory source to use, deserialised from the `[directory]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryConfig {
  #[default]
  Fixture,
  Snapshot {
    /// Directory holding one `<endpoint>.json` file per endpoint.
    root: PathBuf,
  },
}

/// The directory source selected at startup.
pub enum AnyDirectory {
  Fixture(FixtureDirectory),
  Snapshot(SnapshotDirectory),
}

impl AnyDirectory {
  pub fn from_config(config: &DirectoryConfig) -> Self {
    match config {
      DirectoryConfig::Fixture => Self::Fixture(FixtureDirectory::default()),
      DirectoryConfig::Snapshot { root } => {
        Self::Snapshot(SnapshotDirectory::new(root.clone()))
      }
    }
  }
}

impl DirectorySource for AnyDirectory {
  type Error = Error;

  async fn fetch_accounts(&self, endpoint: &str) -> Result<Vec<DirectoryRecord>> {
    match self {
      Self::Fixture(d) => d.fetch_accounts(endpoint).await,
      Self::Snapshot(d) => d.fetch_accounts(endpoint).await,
    }
  }
}

// ─── Snapshot files ──────────────────────────────────────────────────────────

/// Reads `<root>/<endpoint>.json`, a JSON array of [`DirectoryRecord`]s.
///
/// Every non-alphanumeric character of the endpoint becomes `_` in the file
/// name, so `ldap.example.com:389` is read from `ldap_example_com_389.json`.
#[derive(Debug, Clone)]
pub struct SnapshotDirectory {
  root: PathBuf,
}

impl SnapshotDirectory {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn snapshot_path(&self, endpoint: &str) -> PathBuf {
    let stem: String = endpoint
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
      .collect();
    self.root.join(format!("{stem}.json"))
  }
}

impl DirectorySource for SnapshotDirectory {
  type Error = Error;

  async fn fetch_accounts(&self, endpoint: &str) -> Result<Vec<DirectoryRecord>> {
    let path = self.snapshot_path(endpoint);
    let raw = tokio::fs::read(&path).await?;
    parse_snapshot(&path, &raw)
  }
}

fn parse_snapshot(path: &Path, raw: &[u8]) -> Result<Vec<DirectoryRecord>> {
  serde_json::from_slice(raw).map_err(|source| Error::Snapshot {
    path: path.display().to_string(),
    source,
  })
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// A fixed demo population for two well-known endpoints, with dates relative
/// to the moment of the fetch. Any other endpoint is empty.
#[derive(Debug, Clone, Default)]
pub struct FixtureDirectory {
  /// Pin "now" for reproducible output; the wall clock otherwise.
  pub pinned: Option<DateTime<Utc>>,
}

/// `(username, domain, manager, password age in days, expires in days)`
type Fixture = (&'static str, &'static str, &'static str, i64, i64);

const PRIMARY: &[Fixture] = &[
  ("jdoe", "test.com", "manager1", 85, 4),
  ("asmith", "test.com", "manager1", 95, -1),
  ("mjohnson", "test.com", "manager2", 80, -2),
  ("rlee", "test.com", "manager2", 75, 30),
  ("pwilson", "test.com", "manager1", 89, 20),
];

const SECONDARY: &[Fixture] = &[
  ("jsmith", "test2.com", "manager3", 88, 5),
  ("mwilliams", "test2.com", "manager3", 92, -3),
  ("rbrown", "test2.com", "manager4", 82, -1),
  ("dthomas", "test2.com", "manager4", 78, 25),
  ("kwhite", "test2.com", "manager3", 91, 15),
];

impl FixtureDirectory {
  pub fn records(&self, endpoint: &str, now: DateTime<Utc>) -> Vec<DirectoryRecord> {
    let fixtures: &[Fixture] = match endpoint {
      "localhost:389" => PRIMARY,
      "test.ldap:389" => SECONDARY,
      _ => &[],
    };
    fixtures
      .iter()
      .map(|&(username, domain, manager, password_age, expires_in)| DirectoryRecord {
        username:            username.to_owned(),
        email:               format!("{username}@{domain}"),
        manager_email:       format!("{manager}@{domain}"),
        password_changed_at: Some(now - Duration::days(password_age)),
        expires_at:          Some(now + Duration::days(expires_in)),
        is_disabled:         false,
      })
      .collect()
  }
}

impl DirectorySource for FixtureDirectory {
  type Error = Error;

  async fn fetch_accounts(&self, endpoint: &str) -> Result<Vec<DirectoryRecord>> {
    Ok(self.records(endpoint, self.pinned.unwrap_or_else(Utc::now)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_path_sanitises_endpoint() {
    let dir = SnapshotDirectory::new("/var/lib/keeper");
    assert_eq!(
      dir.snapshot_path("ldap.example.com:389"),
      PathBuf::from("/var/lib/keeper/ldap_example_com_389.json")
    );
  }

  #[tokio::test]
  async fn snapshot_reads_records() {
    let root = tempfile::tempdir().unwrap();
    let dir = SnapshotDirectory::new(root.path());
    std::fs::write(
      dir.snapshot_path("e1"),
      r#"[
        {"username": "alice", "email": "alice@example.com",
         "expires_at": "2030-01-01T00:00:00Z"},
        {"username": "bob", "is_disabled": true}
      ]"#,
    )
    .unwrap();

    let records = dir.fetch_accounts("e1").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].email, "alice@example.com");
    assert!(records[0].expires_at.is_some());
    assert!(records[1].is_disabled);
    assert_eq!(records[1].manager_email, "");
  }

  #[tokio::test]
  async fn missing_snapshot_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let dir = SnapshotDirectory::new(root.path());
    assert!(matches!(dir.fetch_accounts("nowhere").await, Err(Error::Io(_))));
  }

  #[tokio::test]
  async fn invalid_snapshot_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let dir = SnapshotDirectory::new(root.path());
    std::fs::write(dir.snapshot_path("e1"), "{not json").unwrap();
    assert!(matches!(
      dir.fetch_accounts("e1").await,
      Err(Error::Snapshot { .. })
    ));
  }

  #[tokio::test]
  async fn fixtures_cover_known_endpoints_only() {
    let now = Utc::now();
    let dir = FixtureDirectory { pinned: Some(now) };

    let primary = dir.fetch_accounts("localhost:389").await.unwrap();
    assert_eq!(primary.len(), 5);
    assert_eq!(primary[0].username, "jdoe");
    assert_eq!(primary[0].expires_at, Some(now + Duration::days(4)));
    assert_eq!(primary[0].manager_email, "manager1@test.com");

    assert_eq!(dir.fetch_accounts("test.ldap:389").await.unwrap().len(), 5);
    assert!(dir.fetch_accounts("elsewhere:389").await.unwrap().is_empty());
  }

  #[test]
  fn config_parses_tagged_kinds() {
    let cfg: DirectoryConfig =
      serde_json::from_str(r#"{"kind": "snapshot", "root": "/srv/snapshots"}"#).unwrap();
    assert_eq!(
      cfg,
      DirectoryConfig::Snapshot { root: PathBuf::from("/srv/snapshots") }
    );
    let cfg: DirectoryConfig = serde_json::from_str(r#"{"kind": "fixture"}"#).unwrap();
    assert_eq!(cfg, DirectoryConfig::Fixture);
  }
}
