//! The `DirectorySource` trait, where account snapshots come from.

use std::future::Future;

use crate::account::DirectoryRecord;

/// A directory that can list the accounts one endpoint currently knows about.
///
/// Implementations own protocol, transport and authentication; Keeper only
/// consumes the resulting snapshot.
pub trait DirectorySource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch a full snapshot of the accounts known to `endpoint`.
  fn fetch_accounts<'a>(
    &'a self,
    endpoint: &'a str,
  ) -> impl Future<Output = Result<Vec<DirectoryRecord>, Self::Error>> + Send + 'a;
}
