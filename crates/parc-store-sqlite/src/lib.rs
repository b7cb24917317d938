//! SQLite backend for the Parc store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write runs in a single
//! `BEGIN IMMEDIATE` transaction, which serialises hours updates and their
//! scheduler runs per database.

mod encode;
mod host;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
