//! Core types, the preventive-maintenance scheduler, and the store trait for
//! Parc.
//!
//! This crate has no database or I/O dependencies. The scheduler in
//! [`schedule`] is a set of pure functions; storage backends implement
//! [`store::ParcStore`] and run those functions inside their own transaction
//! boundary.

// Backends implement the store trait with native `async fn`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod notification;
pub mod oi;
pub mod schedule;
pub mod store;
pub mod task;
pub mod template;
pub mod user;
pub mod visit;

pub use error::{Error, Result};
