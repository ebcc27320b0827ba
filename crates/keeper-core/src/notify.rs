//! Notification vocabulary, message rendering, and the `NotificationSink` trait.
//!
//! The engine decides *which* notification applies; this module turns that
//! decision into a plain-text [`Message`]. Sinks only deliver messages.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::account::Account;

const SIGNATURE: &str = "Best regards,\nAccount Management Team";

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Every notification Keeper can send.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
  ExpirationWarning,
  PasswordChangeRequired,
  Disabled,
  Archived,
  Raw,
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A display name plus address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
  pub name:    String,
  pub address: String,
}

impl Mailbox {
  pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
    Self { name: name.into(), address: address.into() }
  }
}

impl std::fmt::Display for Mailbox {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.name.is_empty() {
      write!(f, "<{}>", self.address)
    } else {
      write!(f, "{} <{}>", self.name, self.address)
    }
  }
}

/// A fully rendered notification, ready for a sink to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub kind:    NotificationKind,
  pub to:      Mailbox,
  /// Courtesy copy, normally the account's manager.
  pub cc:      Option<Mailbox>,
  pub subject: String,
  pub body:    String,
}

impl Message {
  fn for_account(
    kind: NotificationKind,
    account: &Account,
    subject: &str,
    reason: String,
  ) -> Self {
    Self {
      kind,
      to: Mailbox::new(account.username.clone(), account.email.clone()),
      cc: account.manager().map(|m| Mailbox::new("Manager", m)),
      subject: subject.to_owned(),
      body: format!("Dear {},\n\n{reason}\n\n{SIGNATURE}", account.username),
    }
  }

  pub fn expiration_warning(account: &Account) -> Self {
    let date = account
      .expiration()
      .map(|at| at.format("%Y-%m-%d").to_string())
      .unwrap_or_else(|| "an upcoming date".to_owned());
    Self::for_account(
      NotificationKind::ExpirationWarning,
      account,
      "Account Expiration Notice",
      format!(
        "Your account will expire on {date}. Please contact your system \
         administrator to extend your account."
      ),
    )
  }

  pub fn password_change_required(account: &Account) -> Self {
    Self::for_account(
      NotificationKind::PasswordChangeRequired,
      account,
      "Password Change Required",
      "Your password has exceeded the maximum allowed age. Please change \
       your password immediately to avoid account disablement."
        .to_owned(),
    )
  }

  pub fn disabled(account: &Account) -> Self {
    Self::for_account(
      NotificationKind::Disabled,
      account,
      "Account Disabled",
      "Your account has been disabled because its expiration date has \
       passed. Please contact your system administrator to re-enable your \
       account."
        .to_owned(),
    )
  }

  pub fn archived(account: &Account) -> Self {
    Self::for_account(
      NotificationKind::Archived,
      account,
      "Account Archived",
      "Your account has been archived. Please contact your system \
       administrator if you need to restore your account."
        .to_owned(),
    )
  }

  /// An arbitrary message with no account attached.
  pub fn raw(
    to: impl Into<String>,
    subject: impl Into<String>,
    body: impl Into<String>,
  ) -> Self {
    Self {
      kind:    NotificationKind::Raw,
      to:      Mailbox::new("", to),
      cc:      None,
      subject: subject.into(),
      body:    body.into(),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A transport that delivers rendered messages.
///
/// Implementors provide [`deliver`](NotificationSink::deliver); the per-kind
/// senders render the message for an account and hand it over.
pub trait NotificationSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Deliver one message. Success or failure is reported to the caller.
  fn deliver(
    &self,
    message: Message,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn send_expiration_warning(
    &self,
    account: &Account,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.deliver(Message::expiration_warning(account))
  }

  fn send_password_change_required(
    &self,
    account: &Account,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.deliver(Message::password_change_required(account))
  }

  fn send_disabled(
    &self,
    account: &Account,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.deliver(Message::disabled(account))
  }

  fn send_archived(
    &self,
    account: &Account,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.deliver(Message::archived(account))
  }

  fn send_raw(
    &self,
    to: &str,
    subject: &str,
    body: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.deliver(Message::raw(to, subject, body))
  }
}
