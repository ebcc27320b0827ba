//! Core types and trait definitions for the Keeper account lifecycle service.
//!
//! This crate has no runtime or database dependencies.
//! Storage backends, directory sources and notification sinks implement the
//! traits defined here; the service crate drives them.

// Native `async fn` in trait impls; the trait declarations spell out `Send`.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod directory;
pub mod error;
pub mod notify;
pub mod policy;
pub mod store;

pub use error::{Error, Result};
