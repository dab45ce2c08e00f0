//! Error type for `jobmarket-store-sqlite`.

use jobmarket_core::report::SchemaConflict;
use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] jobmarket_core::Error),

  /// The database could not be opened, or its connection thread is gone.
  #[error("cannot reach database: {0}")]
  Connectivity(String),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// A job with this URL is already stored. Nothing was written.
  #[error("job already ingested: {job_url}")]
  DuplicateJob { job_url: String },

  /// A constraint other than the job URL rejected a write; the transaction
  /// was rolled back.
  #[error("integrity violation: {0}")]
  Integrity(String),

  #[error(transparent)]
  SchemaConflict(#[from] SchemaConflict),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl Error {
  /// The job was skipped because its URL is already stored.
  pub fn is_duplicate(&self) -> bool { matches!(self, Self::DuplicateJob { .. }) }

  /// Classify a failed write: constraint violations become
  /// [`Error::Integrity`], anything else stays a SQLite error.
  pub(crate) fn from_write(err: rusqlite::Error) -> Self {
    if is_constraint_violation(&err) {
      Self::Integrity(err.to_string())
    } else {
      Self::Sqlite(err)
    }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::ConnectionClosed => {
        Self::Connectivity("connection closed".to_owned())
      }
      tokio_rusqlite::Error::Rusqlite(e) => Self::Sqlite(e),
      other => Self::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── SQLite error classification ─────────────────────────────────────────────

/// The constraint message (e.g. `"UNIQUE constraint failed: jobs.job_url"`)
/// if `err` is a unique or primary-key violation.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
  match err {
    rusqlite::Error::SqliteFailure(e, msg)
      if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
    {
      Some(msg.as_deref().unwrap_or_default())
    }
    _ => None,
  }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
  )
}

/// Errors caused by the data or the statement rather than the connection:
/// constraint violations, SQLite refusing a schema change outright (reported
/// as a generic `SQLITE_ERROR`), and generated DDL it cannot parse.
pub(crate) fn is_schema_conflict(err: &rusqlite::Error) -> bool {
  match err {
    rusqlite::Error::SqliteFailure(e, _) => {
      matches!(e.code, ErrorCode::ConstraintViolation | ErrorCode::Unknown)
    }
    rusqlite::Error::SqlInputError { .. } => true,
    _ => false,
  }
}
