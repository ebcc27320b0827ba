//! Account reconciliation, lifecycle notification and scheduling for Keeper.
//!
//! Pulls snapshots from a [`DirectorySource`], merges them into any
//! [`AccountStore`], and sends lifecycle notifications through a
//! [`NotificationSink`] on a daily cadence.
//!
//! [`DirectorySource`]: keeper_core::directory::DirectorySource
//! [`AccountStore`]: keeper_core::store::AccountStore
//! [`NotificationSink`]: keeper_core::notify::NotificationSink

pub mod admin;
pub mod directory;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod schedule;
pub mod sink;

pub use error::{Error, Result};

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::NaiveTime;
use keeper_core::{policy::LifecyclePolicy, store::AccountStore};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use directory::{AnyDirectory, DirectoryConfig};
use engine::NotificationEngine;
use schedule::{RunMode, Schedule, Scheduler};
use sink::{AnySink, NotifyConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_run_at() -> String { "08:00".to_owned() }

fn default_backoff_secs() -> u64 { 300 }

/// The `[schedule]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
  /// Local time of the daily run, `HH:MM`.
  #[serde(default = "default_run_at")]
  pub run_at:       String,
  /// Delay before retrying after a failed cycle.
  #[serde(default = "default_backoff_secs")]
  pub backoff_secs: u64,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    Self { run_at: default_run_at(), backoff_secs: default_backoff_secs() }
  }
}

impl ScheduleConfig {
  pub fn schedule(&self) -> Result<Schedule> {
    let run_at = NaiveTime::parse_from_str(&self.run_at, "%H:%M").map_err(|e| {
      Error::Config(format!("schedule.run_at {:?} is not HH:MM: {e}", self.run_at))
    })?;
    Ok(Schedule { run_at, backoff: Duration::from_secs(self.backoff_secs) })
  }
}

/// Runtime service configuration, deserialised from `keeper.toml` and
/// `KEEPER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  pub store_path:    PathBuf,
  /// Directory endpoints, reconciled in this order every cycle.
  #[serde(default)]
  pub endpoints:     Vec<String>,
  #[serde(default)]
  pub mode:          RunMode,
  #[serde(default)]
  pub schedule:      ScheduleConfig,
  #[serde(default)]
  pub policy:        LifecyclePolicy,
  #[serde(default)]
  pub directory:     DirectoryConfig,
  #[serde(default)]
  pub notifications: NotifyConfig,
}

impl ServiceConfig {
  /// Layer `path` (optional) under `KEEPER_*` environment variables.
  /// Nested keys use `__`, e.g. `KEEPER_SCHEDULE__RUN_AT=07:30`; endpoints are
  /// comma-separated in `KEEPER_ENDPOINTS`.
  pub fn load(path: &Path) -> Result<Self> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
          config::Environment::with_prefix("KEEPER")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("endpoints")
            .try_parsing(true),
        ),
    )
  }

  pub fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> Result<Self> {
    let cfg: Self = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<()> {
    self.schedule.schedule()?;
    if self.schedule.backoff_secs == 0 {
      return Err(Error::Config("schedule.backoff_secs must be positive".into()));
    }
    if self.endpoints.iter().any(|e| e.trim().is_empty()) {
      return Err(Error::Config("endpoints must not contain empty entries".into()));
    }
    if !(self.policy.warning_days > 0.0) {
      return Err(Error::Config("policy.warning_days must be positive".into()));
    }
    if !(self.policy.password_max_age_days > 0.0) {
      return Err(Error::Config(
        "policy.password_max_age_days must be positive".into(),
      ));
    }
    if self.endpoints.is_empty() {
      tracing::warn!("no endpoints configured; cycles will only evaluate stored accounts");
    }
    Ok(())
  }
}

// ─── Wiring ───────────────────────────────────────────────────────────────────

/// Build a scheduler over `store` with the directory and sink named in
/// `config`.
pub fn build_scheduler<S: AccountStore>(
  config: &ServiceConfig,
  store: S,
  cancel: CancellationToken,
) -> Result<Scheduler<S, AnyDirectory, AnySink>> {
  let engine = NotificationEngine::new(
    AnySink::from_config(&config.notifications),
    config.policy,
  );
  Ok(Scheduler::new(
    store,
    AnyDirectory::from_config(&config.directory),
    engine,
    config.endpoints.clone(),
    config.schedule.schedule()?,
    cancel,
  ))
}
