//! Error types for `keeper-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("directory record has an empty username")]
  EmptyUsername,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
