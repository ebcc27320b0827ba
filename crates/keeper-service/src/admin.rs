//! Administrative operations that sit outside the scheduled cycle.

use keeper_core::{
  account::{Account, AccountKey},
  notify::NotificationSink,
  store::AccountStore,
};

use crate::{Error, Result};

/// Archive a live account and send the *archived* notification.
///
/// Archival is persisted before the send; if delivery fails the account stays
/// archived and the notification error is returned.
pub async fn archive_account<S, N>(store: &S, sink: &N, key: &AccountKey) -> Result<Account>
where
  S: AccountStore,
  N: NotificationSink,
{
  let account = store
    .archive(key)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::AccountNotFound(key.clone()))?;
  tracing::info!(endpoint = %key.endpoint, username = %key.username, "account archived");

  sink.send_archived(&account).await.map_err(Error::notify)?;
  Ok(account)
}

/// Send a raw message through `sink` to check the notification wiring.
pub async fn send_test_notification<N: NotificationSink>(sink: &N, to: &str) -> Result<()> {
  sink
    .send_raw(
      to,
      "Keeper test notification",
      "This is a test message from the Keeper account lifecycle service.",
    )
    .await
    .map_err(Error::notify)
}
