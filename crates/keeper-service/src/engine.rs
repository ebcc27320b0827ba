//! The notification engine: applies [`LifecyclePolicy`] to every live account.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use keeper_core::{
  notify::{NotificationKind, NotificationSink},
  policy::{Action, LifecyclePolicy},
  store::{AccountBatch, AccountStore},
};
use strum::IntoEnumIterator as _;

use crate::{Error, Result};

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
  pub evaluated: usize,
  /// Accounts flipped to disabled this pass.
  pub disabled:  usize,
  /// Sends that failed; each failure ends that account's evaluation.
  pub failed:    usize,
  pub sent:      HashMap<NotificationKind, usize>,
}

impl EvaluationReport {
  pub fn sent(&self, kind: NotificationKind) -> usize {
    self.sent.get(&kind).copied().unwrap_or(0)
  }

  /// `kind=count` pairs for every kind sent at least once.
  pub fn sent_summary(&self) -> String {
    NotificationKind::iter()
      .filter_map(|kind| match self.sent(kind) {
        0 => None,
        n => Some(format!("{kind}={n}")),
      })
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Evaluates lifecycle rules and sends the resulting notifications.
pub struct NotificationEngine<N> {
  sink:   N,
  policy: LifecyclePolicy,
}

impl<N: NotificationSink> NotificationEngine<N> {
  pub fn new(sink: N, policy: LifecyclePolicy) -> Self { Self { sink, policy } }

  /// Evaluate every non-archived account in `store` at `now`.
  ///
  /// A failed send is logged and the pass moves on to the next account.
  /// Disablements are collected and committed as one batch at the end, even
  /// when the matching notification could not be delivered; a commit failure
  /// is returned.
  pub async fn evaluate<S: AccountStore>(
    &self,
    store: &S,
    now: DateTime<Utc>,
  ) -> Result<EvaluationReport> {
    let accounts = store.active_accounts().await.map_err(Error::store)?;
    tracing::info!(accounts = accounts.len(), "evaluating notifications");

    let mut report = EvaluationReport::default();
    let mut batch = AccountBatch::default();

    for mut account in accounts {
      report.evaluated += 1;

      for action in self.policy.evaluate(&account, now) {
        let (kind, result) = match action {
          Action::WarnExpiration => (
            NotificationKind::ExpirationWarning,
            self.sink.send_expiration_warning(&account).await,
          ),
          Action::Disable => {
            account.is_disabled = true;
            batch.updates.push(account.clone());
            report.disabled += 1;
            tracing::info!(
              endpoint = %account.endpoint,
              username = %account.username,
              "account expired; disabling"
            );
            (
              NotificationKind::Disabled,
              self.sink.send_disabled(&account).await,
            )
          }
          Action::RequirePasswordChange => (
            NotificationKind::PasswordChangeRequired,
            self.sink.send_password_change_required(&account).await,
          ),
        };

        match result {
          Ok(()) => {
            tracing::info!(
              endpoint = %account.endpoint,
              username = %account.username,
              %kind,
              "notification sent"
            );
            *report.sent.entry(kind).or_default() += 1;
          }
          Err(e) => {
            tracing::error!(
              endpoint = %account.endpoint,
              username = %account.username,
              %kind,
              error = %e,
              "failed to send notification"
            );
            report.failed += 1;
            break;
          }
        }
      }
    }

    if !batch.is_empty() {
      store.commit(batch).await.map_err(Error::store)?;
    }

    tracing::info!(
      evaluated = report.evaluated,
      disabled = report.disabled,
      failed = report.failed,
      sent = %report.sent_summary(),
      "notification pass complete"
    );
    Ok(report)
  }
}
