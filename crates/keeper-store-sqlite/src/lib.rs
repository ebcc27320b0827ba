//! SQLite backend for the Keeper account store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every [`AccountBatch`] is applied in a
//! single transaction.
//!
//! [`AccountBatch`]: keeper_core::store::AccountBatch

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
