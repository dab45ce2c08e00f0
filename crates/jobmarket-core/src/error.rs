//! Error types for `jobmarket-core`.

use thiserror::Error;

/// A declared [`Schema`](crate::schema::Schema) that cannot be reconciled.
#[derive(Debug, Error)]
pub enum Error {
  #[error("table {0:?} is declared more than once")]
  DuplicateTable(String),

  #[error("column {column:?} is declared more than once in table {table:?}")]
  DuplicateColumn { table: String, column: String },

  #[error("table {table:?} has a constraint on undeclared column {column:?}")]
  UnknownColumn { table: String, column: String },

  /// Foreign keys may only point at tables declared earlier in the schema,
  /// so that tables can be created in declaration order.
  #[error("table {table:?} references {references:?}, which is not declared before it")]
  UnknownReference { table: String, references: String },

  #[error("table {0:?} has an empty constraint")]
  EmptyConstraint(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
