//! Core types and trait definitions for the job market store.
//!
//! This crate is deliberately free of database dependencies. It holds the
//! declarative schema model, the differ that compares it against a live
//! catalog snapshot, the job/skill/category records, and the [`JobStore`]
//! trait that storage backends implement.
//!
//! [`JobStore`]: store::JobStore

pub mod descriptor;
pub mod diff;
pub mod error;
pub mod job;
pub mod model;
pub mod report;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
