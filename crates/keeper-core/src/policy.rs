//! Lifecycle rules: which transition and notification apply to an account.
//!
//! Evaluation is a pure function of the account and the current instant. The
//! notification engine applies the resulting [`Action`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Real-valued days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
  (to - from).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// One step the engine must take for an account this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  /// Expiration is near; send a warning. No state change.
  WarnExpiration,
  /// Expiration has passed on an enabled account; set `is_disabled` and
  /// notify.
  Disable,
  /// The password is older than the maximum age; send a reminder. No state
  /// change.
  RequirePasswordChange,
}

/// Thresholds for the lifecycle rules.
///
/// Warnings are not suppressed between cycles: an account that stays inside a
/// window is notified again on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecyclePolicy {
  /// Warn when expiration is at most this many days away.
  pub warning_days:          f64,
  /// Require a password change once it is at least this many days old.
  pub password_max_age_days: f64,
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self { warning_days: 30.0, password_max_age_days: 90.0 }
  }
}

impl LifecyclePolicy {
  /// Decide the actions for `account` at `now`, expiration rule first.
  ///
  /// Archived accounts never yield actions. An absent (or "never") expiration
  /// exempts the account from the expiration rule; an absent password change
  /// date exempts it from the password rule.
  pub fn evaluate(&self, account: &Account, now: DateTime<Utc>) -> Vec<Action> {
    let mut actions = Vec::new();
    if account.is_archived {
      return actions;
    }

    if let Some(expires_at) = account.expiration() {
      let days_until = days_between(now, expires_at);
      if days_until > 0.0 && days_until <= self.warning_days {
        actions.push(Action::WarnExpiration);
      } else if days_until <= 0.0 && !account.is_disabled {
        actions.push(Action::Disable);
      }
    }

    if let Some(changed_at) = account.password_changed_at
      && days_between(changed_at, now) >= self.password_max_age_days
    {
      actions.push(Action::RequirePasswordChange);
    }

    actions
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use uuid::Uuid;

  use super::*;
  use crate::account::{DirectoryRecord, NewAccount};

  fn account(
    now: DateTime<Utc>,
    expires_in: Option<Duration>,
    password_age: Option<Duration>,
  ) -> Account {
    let mut record = DirectoryRecord::new("a");
    record.expires_at = expires_in.map(|d| now + d);
    record.password_changed_at = password_age.map(|d| now - d);
    NewAccount::from_record("e1", record, now).into_account(Uuid::new_v4())
  }

  #[test]
  fn warns_inside_window_only() {
    let now = Utc::now();
    let policy = LifecyclePolicy::default();

    let inside = account(now, Some(Duration::days(15)), None);
    assert_eq!(policy.evaluate(&inside, now), vec![Action::WarnExpiration]);

    let edge = account(now, Some(Duration::days(30)), None);
    assert_eq!(policy.evaluate(&edge, now), vec![Action::WarnExpiration]);

    let outside = account(now, Some(Duration::days(31)), None);
    assert!(policy.evaluate(&outside, now).is_empty());
  }

  #[test]
  fn disables_after_expiration_once() {
    let now = Utc::now();
    let policy = LifecyclePolicy::default();

    let mut expired = account(now, Some(Duration::days(-1)), None);
    assert_eq!(policy.evaluate(&expired, now), vec![Action::Disable]);

    expired.is_disabled = true;
    assert!(policy.evaluate(&expired, now).is_empty());
  }

  #[test]
  fn expiring_exactly_now_disables() {
    let now = Utc::now();
    let expired = account(now, Some(Duration::zero()), None);
    assert_eq!(
      LifecyclePolicy::default().evaluate(&expired, now),
      vec![Action::Disable]
    );
  }

  #[test]
  fn password_age_threshold() {
    let now = Utc::now();
    let policy = LifecyclePolicy::default();

    let fresh = account(now, None, Some(Duration::days(89)));
    assert!(policy.evaluate(&fresh, now).is_empty());

    let stale = account(now, None, Some(Duration::days(90)));
    assert_eq!(policy.evaluate(&stale, now), vec![Action::RequirePasswordChange]);
  }

  #[test]
  fn both_rules_fire_in_order() {
    let now = Utc::now();
    let both = account(now, Some(Duration::days(5)), Some(Duration::days(120)));
    assert_eq!(
      LifecyclePolicy::default().evaluate(&both, now),
      vec![Action::WarnExpiration, Action::RequirePasswordChange]
    );
  }

  #[test]
  fn archived_and_missing_fields_are_exempt() {
    let now = Utc::now();
    let policy = LifecyclePolicy::default();

    let mut archived =
      account(now, Some(Duration::days(-3)), Some(Duration::days(400)));
    archived.is_archived = true;
    assert!(policy.evaluate(&archived, now).is_empty());

    let bare = account(now, None, None);
    assert!(policy.evaluate(&bare, now).is_empty());

    let mut never = account(now, None, None);
    never.expires_at = Some(DateTime::<Utc>::MAX_UTC);
    assert!(policy.evaluate(&never, now).is_empty());
  }

  #[test]
  fn custom_thresholds() {
    let now = Utc::now();
    let policy = LifecyclePolicy { warning_days: 7.0, password_max_age_days: 30.0 };
    let a = account(now, Some(Duration::days(10)), Some(Duration::days(31)));
    assert_eq!(policy.evaluate(&a, now), vec![Action::RequirePasswordChange]);
  }
}
