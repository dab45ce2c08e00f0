//! SQLite backend for the job market store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The synchronous building blocks
//! ([`reconcile::reconcile`], [`ingest::ingest`], [`resolve::resolve`]) are
//! public for callers that own a [`rusqlite::Connection`] themselves.

mod encode;
mod queries;
mod store;

pub mod ddl;
pub mod error;
pub mod ingest;
pub mod introspect;
pub mod reconcile;
pub mod resolve;

pub use error::{Error, Result};
pub use store::SqliteStore;
