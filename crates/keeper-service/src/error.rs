//! Error type for the Keeper service layer.

use keeper_core::account::AccountKey;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to fetch accounts from {endpoint}: {source}")]
  Fetch {
    endpoint: String,
    #[source]
    source:   BoxError,
  },
  #[error("store error: {0}")]
  Store(#[source] BoxError),
  #[error("notification error: {0}")]
  Notify(#[source] BoxError),
  #[error("no live account {0}")]
  AccountNotFound(AccountKey),
  #[error("snapshot {path} is not valid JSON: {source}")]
  Snapshot {
    path:   String,
    #[source]
    source: serde_json::Error,
  },
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("configuration error: {0}")]
  Settings(#[from] config::ConfigError),
  #[error("invalid configuration: {0}")]
  Config(String),
  #[error("cycle failed: {0}")]
  CycleFailed(String),
  #[error("cancelled")]
  Cancelled,
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn notify(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Notify(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
