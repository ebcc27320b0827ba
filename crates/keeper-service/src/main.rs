//! keeper service binary.
//!
//! Reads `keeper.toml` (or the path given with `--config`) layered under
//! `KEEPER_*` environment variables, opens the SQLite account store, and runs
//! the reconciliation and notification cycle.
//!
//! ```text
//! keeper run            # daily at schedule.run_at until interrupted
//! keeper run --once     # a single cycle, non-zero exit on failure
//! keeper accounts --endpoint localhost:389
//! keeper archive localhost:389 jdoe
//! keeper notify-test ops@example.com
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use keeper_core::{
  account::{Account, AccountKey},
  store::{AccountQuery, AccountStore},
};
use keeper_service::{
  ServiceConfig, admin, build_scheduler,
  schedule::RunMode,
  sink::AnySink,
};
use keeper_store_sqlite::SqliteStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Keeper account lifecycle service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "keeper.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Reconcile every endpoint and send notifications.
  Run {
    /// Run a single cycle and exit, overriding the configured mode.
    #[arg(long)]
    once: bool,
  },
  /// List stored accounts.
  Accounts {
    #[arg(long)]
    endpoint:         Option<String>,
    #[arg(long)]
    include_archived: bool,
    /// Print JSON instead of a table.
    #[arg(long)]
    json:             bool,
  },
  /// Archive an account and notify its owner.
  Archive { endpoint: String, username: String },
  /// Send a test message through the configured notification sink.
  NotifyTest { to: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = ServiceConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  // `notify-test` needs no store.
  if let Command::NotifyTest { to } = &cli.command {
    let sink = AnySink::from_config(&cfg.notifications);
    admin::send_test_notification(&sink, to)
      .await
      .context("failed to send test notification")?;
    println!("test notification sent to {to}");
    return Ok(());
  }

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Run { once } => {
      let mode = if once { RunMode::Once } else { cfg.mode };
      let cancel = CancellationToken::new();
      tokio::spawn(cancel_on_shutdown(cancel.clone()));

      let scheduler = build_scheduler(&cfg, store, cancel)?;
      tracing::info!(?mode, endpoints = cfg.endpoints.len(), "keeper starting");
      scheduler.run(mode).await.context("cycle failed")?;
    }
    Command::Accounts { endpoint, include_archived, json } => {
      let query = AccountQuery { endpoint, include_archived };
      let accounts = store
        .list_accounts(&query)
        .await
        .context("failed to list accounts")?;
      if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
      } else {
        print_table(&accounts);
      }
    }
    Command::Archive { endpoint, username } => {
      let sink = AnySink::from_config(&cfg.notifications);
      let key = AccountKey::new(endpoint, username);
      let account = admin::archive_account(&store, &sink, &key)
        .await
        .with_context(|| format!("failed to archive {key}"))?;
      println!("archived {}", account.key());
    }
    Command::NotifyTest { .. } => {}
  }

  Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn cancel_on_shutdown(token: CancellationToken) {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!("failed to install Ctrl+C handler: {e}");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!("failed to install SIGTERM handler: {e}");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
    _ = terminate => tracing::info!("received SIGTERM, shutting down"),
  }
  token.cancel();
}

fn print_table(accounts: &[Account]) {
  println!("ENDPOINT\tUSERNAME\tEMAIL\tEXPIRES\tPASSWORD CHANGED\tSTATE");
  for a in accounts {
    let state = match (a.is_archived, a.is_disabled) {
      (true, _) => "archived",
      (false, true) => "disabled",
      (false, false) => "active",
    };
    println!(
      "{}\t{}\t{}\t{}\t{}\t{}",
      a.endpoint,
      a.username,
      a.email,
      date_or_dash(a.expiration()),
      date_or_dash(a.password_changed_at),
      state,
    );
  }
}

fn date_or_dash(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
  at.map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "-".to_owned())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
