//! The scheduler: runs full cycles (every endpoint, then one notification
//! pass) once or on a daily cadence.

use std::time::Duration;

use chrono::{DateTime, Local, LocalResult, NaiveTime, TimeZone, Utc};
use keeper_core::{
  directory::DirectorySource,
  notify::NotificationSink,
  store::AccountStore,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
  Error, Result,
  engine::{EvaluationReport, NotificationEngine},
  reconcile::{ReconcileReport, reconcile},
};

// ─── Cadence ─────────────────────────────────────────────────────────────────

/// Whether to run a single cycle or keep running on the daily schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
  Once,
  #[default]
  Continuous,
}

/// When continuous mode runs, and how long it waits after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
  /// Local wall-clock time of the daily run.
  pub run_at:  NaiveTime,
  pub backoff: Duration,
}

impl Default for Schedule {
  fn default() -> Self {
    Self {
      run_at:  NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
      backoff: Duration::from_secs(5 * 60),
    }
  }
}

/// The first `run_at` wall-clock time in `now`'s time zone strictly after
/// `now`.
///
/// If `run_at` falls in a daylight-saving gap on some day, that day's run
/// happens one hour later. If it occurs twice (clocks going back), the first
/// occurrence after `now` is used, so the second one still counts when `now`
/// falls between them.
pub fn next_run_time<Tz: TimeZone>(now: &DateTime<Tz>, run_at: NaiveTime) -> DateTime<Tz> {
  let tz = now.timezone();
  let mut date = now.date_naive();
  loop {
    let local = date.and_time(run_at);
    let candidates = match tz.from_local_datetime(&local) {
      LocalResult::Single(at) => vec![at],
      LocalResult::Ambiguous(first, second) => vec![first, second],
      LocalResult::None => tz
        .from_local_datetime(&(local + chrono::Duration::hours(1)))
        .earliest()
        .into_iter()
        .collect(),
    };
    if let Some(at) = candidates.into_iter().find(|at| at > now) {
      return at;
    }
    let Some(next) = date.succ_opt() else { return now.clone() };
    date = next;
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Outcome of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
  pub reconciled:       Vec<ReconcileReport>,
  /// Endpoints whose fetch or reconcile failed this cycle.
  pub failed_endpoints: Vec<String>,
  pub evaluation:       EvaluationReport,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Drives reconciliation and notification cycles.
///
/// Endpoints are processed sequentially in configured order. Cancelling the
/// token stops the scheduler at its next await point; store batches are
/// transactional, so an interrupted cycle never leaves partial records.
pub struct Scheduler<S, D, N> {
  store:     S,
  directory: D,
  engine:    NotificationEngine<N>,
  endpoints: Vec<String>,
  schedule:  Schedule,
  cancel:    CancellationToken,
}

impl<S, D, N> Scheduler<S, D, N>
where
  S: AccountStore,
  D: DirectorySource,
  N: NotificationSink,
{
  pub fn new(
    store: S,
    directory: D,
    engine: NotificationEngine<N>,
    endpoints: Vec<String>,
    schedule: Schedule,
    cancel: CancellationToken,
  ) -> Self {
    Self { store, directory, engine, endpoints, schedule, cancel }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Run according to `mode`. Continuous mode only returns once cancelled.
  pub async fn run(&self, mode: RunMode) -> Result<()> {
    match mode {
      RunMode::Once => self.run_once().await.map(|_| ()),
      RunMode::Continuous => {
        self.run_forever().await;
        Ok(())
      }
    }
  }

  /// Run exactly one cycle, aborting with [`Error::Cancelled`] if the token
  /// fires first.
  pub async fn run_once(&self) -> Result<CycleReport> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(Error::Cancelled),
      result = self.run_cycle(Utc::now) => result,
    }
  }

  /// Run cycles until cancelled: the daily schedule after a completed cycle,
  /// the fixed backoff after a failed one.
  pub async fn run_forever(&self) {
    tracing::info!(endpoints = self.endpoints.len(), "scheduler started");
    loop {
      let delay = match self.run_once().await {
        Ok(_) => {
          let next = next_run_time(&Local::now(), self.schedule.run_at);
          tracing::info!(next_run = %next, "next cycle scheduled");
          (next.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or_default()
        }
        Err(Error::Cancelled) => break,
        Err(e) => {
          tracing::error!(
            error = %e,
            backoff_secs = self.schedule.backoff.as_secs(),
            "cycle failed; retrying after backoff"
          );
          self.schedule.backoff
        }
      };

      if !self.sleep(delay).await {
        break;
      }
    }
    tracing::info!("scheduler stopped");
  }

  /// Sleep for `delay`; returns `false` if cancelled first.
  async fn sleep(&self, delay: Duration) -> bool {
    tokio::select! {
      _ = self.cancel.cancelled() => false,
      _ = tokio::time::sleep(delay) => true,
    }
  }

  /// One full cycle at `now`: reconcile every endpoint, then evaluate.
  ///
  /// A fetch failure only skips its endpoint. A store failure while
  /// reconciling an endpoint also lets the rest of the cycle run, but the
  /// cycle is then reported as failed. A failure to persist the notification
  /// pass fails the cycle.
  pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
    self.run_cycle(|| now).await
  }

  /// A cycle reading `clock` once per endpoint and once more for the
  /// notification pass, after every fetch has returned.
  async fn run_cycle(
    &self,
    clock: impl Fn() -> DateTime<Utc> + Send + Sync,
  ) -> Result<CycleReport> {
    tracing::info!(endpoints = self.endpoints.len(), "starting cycle");

    let mut report = CycleReport::default();
    let mut persistence_failures = Vec::new();

    for endpoint in &self.endpoints {
      match self.sync_endpoint(endpoint, clock()).await {
        Ok(r) => {
          tracing::info!(
            endpoint = %r.endpoint,
            fetched = r.fetched,
            inserted = r.inserted,
            updated = r.updated,
            "endpoint reconciled"
          );
          report.reconciled.push(r);
        }
        Err(e @ Error::Fetch { .. }) => {
          tracing::warn!(endpoint = %endpoint, error = %e, "skipping endpoint");
          report.failed_endpoints.push(endpoint.clone());
        }
        Err(e) => {
          tracing::error!(endpoint = %endpoint, error = %e, "failed to reconcile endpoint");
          report.failed_endpoints.push(endpoint.clone());
          persistence_failures.push(format!("{endpoint}: {e}"));
        }
      }
    }

    report.evaluation = self.engine.evaluate(&self.store, clock()).await?;

    if !persistence_failures.is_empty() {
      return Err(Error::CycleFailed(persistence_failures.join("; ")));
    }

    tracing::info!(
      reconciled = report.reconciled.len(),
      failed = report.failed_endpoints.len(),
      "cycle complete"
    );
    Ok(report)
  }

  async fn sync_endpoint(&self, endpoint: &str, now: DateTime<Utc>) -> Result<ReconcileReport> {
    let snapshot = self
      .directory
      .fetch_accounts(endpoint)
      .await
      .map_err(|e| Error::Fetch { endpoint: endpoint.to_owned(), source: Box::new(e) })?;
    reconcile(endpoint, snapshot, &self.store, now).await
  }
}

#[cfg(test)]
mod tests {
  use chrono::{FixedOffset, NaiveDate};
  use chrono_tz::America::New_York;

  use super::*;

  fn at(tz: &FixedOffset, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
    tz.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
  }

  fn eight() -> NaiveTime { NaiveTime::from_hms_opt(8, 0, 0).unwrap() }

  #[test]
  fn before_run_time_is_same_day() {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let next = next_run_time(&at(&tz, 2025, 6, 1, 7, 0), eight());
    assert_eq!(next, at(&tz, 2025, 6, 1, 8, 0));
  }

  #[test]
  fn at_or_after_run_time_is_next_day() {
    let tz = FixedOffset::west_opt(5 * 3600).unwrap();
    assert_eq!(
      next_run_time(&at(&tz, 2025, 6, 1, 8, 0), eight()),
      at(&tz, 2025, 6, 2, 8, 0)
    );
    assert_eq!(
      next_run_time(&at(&tz, 2025, 6, 1, 23, 59), eight()),
      at(&tz, 2025, 6, 2, 8, 0)
    );
  }

  #[test]
  fn rolls_over_month_and_year() {
    let next = next_run_time(&Utc.with_ymd_and_hms(2025, 12, 31, 9, 0, 0).unwrap(), eight());
    assert_eq!(
      next.date_naive(),
      NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    );
  }

  #[test]
  fn custom_run_time() {
    let run_at = NaiveTime::from_hms_opt(22, 30, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 22, 29, 0).unwrap();
    assert_eq!(
      next_run_time(&now, run_at),
      Utc.with_ymd_and_hms(2025, 6, 1, 22, 30, 0).unwrap()
    );
  }

  fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
  }

  #[test]
  fn spring_forward_gap_runs_an_hour_later() {
    // 2025-03-09 02:30 does not exist in New York; clocks jump 02:00 -> 03:00.
    let now = New_York.with_ymd_and_hms(2025, 3, 9, 0, 30, 0).unwrap();
    let next = next_run_time(&now, NaiveTime::from_hms_opt(2, 30, 0).unwrap());
    assert_eq!(next.with_timezone(&Utc), utc(2025, 3, 9, 7, 30));
  }

  #[test]
  fn repeated_hour_prefers_first_occurrence() {
    // 2025-11-02 01:30 happens at 05:30 UTC (EDT) and again at 06:30 UTC (EST).
    let run_at = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
    let midnight = New_York.with_ymd_and_hms(2025, 11, 2, 0, 0, 0).unwrap();
    assert_eq!(
      next_run_time(&midnight, run_at).with_timezone(&Utc),
      utc(2025, 11, 2, 5, 30)
    );
  }

  #[test]
  fn repeated_hour_second_occurrence_still_counts() {
    let run_at = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
    let between = New_York
      .with_ymd_and_hms(2025, 11, 2, 1, 45, 0)
      .earliest()
      .unwrap();
    assert_eq!(between.with_timezone(&Utc), utc(2025, 11, 2, 5, 45));
    assert_eq!(
      next_run_time(&between, run_at).with_timezone(&Utc),
      utc(2025, 11, 2, 6, 30)
    );
  }

  #[test]
  fn default_schedule_is_eight_with_five_minute_backoff() {
    let schedule = Schedule::default();
    assert_eq!(schedule.run_at, eight());
    assert_eq!(schedule.backoff, Duration::from_secs(300));
  }
}
