//! Notification sinks shipped with the service.
//!
//! Mail transport is out of scope: [`LogSink`] writes each message to the
//! tracing log, [`OutboxSink`] appends it to a JSON-lines outbox that an
//! external relay drains.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use keeper_core::notify::{Message, NotificationSink};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt as _;

use crate::{Error, Result};

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_from() -> String { "Account Management <accounts@localhost>".to_owned() }

/// The `[notifications]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotifyConfig {
  #[serde(flatten)]
  pub transport: TransportConfig,
  /// Sender shown on every message.
  #[serde(default = "default_from")]
  pub from:      String,
}

impl Default for NotifyConfig {
  fn default() -> Self {
    Self { transport: TransportConfig::default(), from: default_from() }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
  #[default]
  Log,
  Outbox {
    path: PathBuf,
  },
}

/// The sink selected at startup.
pub enum AnySink {
  Log(LogSink),
  Outbox(OutboxSink),
}

impl AnySink {
  pub fn from_config(config: &NotifyConfig) -> Self {
    match &config.transport {
      TransportConfig::Log => Self::Log(LogSink::new(config.from.clone())),
      TransportConfig::Outbox { path } => {
        Self::Outbox(OutboxSink::new(path.clone(), config.from.clone()))
      }
    }
  }
}

impl NotificationSink for AnySink {
  type Error = Error;

  async fn deliver(&self, message: Message) -> Result<()> {
    match self {
      Self::Log(s) => s.deliver(message).await,
      Self::Outbox(s) => s.deliver(message).await,
    }
  }
}

// ─── Log ─────────────────────────────────────────────────────────────────────

/// Emits every message as an `info` event; never fails.
#[derive(Debug, Clone)]
pub struct LogSink {
  from: String,
}

impl LogSink {
  pub fn new(from: impl Into<String>) -> Self { Self { from: from.into() } }
}

impl NotificationSink for LogSink {
  type Error = Error;

  async fn deliver(&self, message: Message) -> Result<()> {
    let cc = message.cc.as_ref().map(ToString::to_string).unwrap_or_default();
    tracing::info!(
      kind = %message.kind,
      from = %self.from,
      to = %message.to,
      cc = %cc,
      subject = %message.subject,
      "notification"
    );
    tracing::debug!(body = %message.body, "notification body");
    Ok(())
  }
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// One line of the outbox file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
  pub from:      String,
  pub queued_at: DateTime<Utc>,
  #[serde(flatten)]
  pub message:   Message,
}

/// Appends each message as a JSON line to `path`, creating the file and its
/// parent directories on first use.
#[derive(Debug, Clone)]
pub struct OutboxSink {
  path: PathBuf,
  from: String,
}

impl OutboxSink {
  pub fn new(path: impl Into<PathBuf>, from: impl Into<String>) -> Self {
    Self { path: path.into(), from: from.into() }
  }
}

impl NotificationSink for OutboxSink {
  type Error = Error;

  async fn deliver(&self, message: Message) -> Result<()> {
    let entry = OutboxEntry {
      from: self.from.clone(),
      queued_at: Utc::now(),
      message,
    };
    let mut line = serde_json::to_string(&entry)?;
    line.push('\n');

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;

    tracing::debug!(path = %self.path.display(), kind = %entry.message.kind, "message queued");
    Ok(())
  }
}
