//! Outcome of a reconciliation run.

use thiserror::Error;

use crate::diff::SchemaOp;

/// A change the live data cannot accommodate, e.g. making a column `NOT NULL`
/// while rows still hold `NULL` in it. The table's changes are abandoned; other
/// tables are still reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {operation} on {table}.{column}: {reason}")]
pub struct SchemaConflict {
  pub table:     String,
  /// One column, or several joined with `", "` when a single rebuild carried
  /// more than one change.
  pub column:    String,
  pub operation: String,
  pub reason:    String,
}

/// What happened to one declared table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
  pub table:    String,
  /// The table did not exist and was created from its declaration.
  pub created:  bool,
  /// Operations that were committed.
  pub applied:  Vec<SchemaOp>,
  pub conflict: Option<SchemaConflict>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  /// One entry per declared table, in declaration order.
  pub tables: Vec<TableReport>,
}

impl ReconcileReport {
  /// Number of committed column operations across all tables.
  pub fn operation_count(&self) -> usize {
    self.tables.iter().map(|t| t.applied.len()).sum()
  }

  pub fn created_tables(&self) -> impl Iterator<Item = &str> {
    self.tables.iter().filter(|t| t.created).map(|t| t.table.as_str())
  }

  pub fn conflicts(&self) -> impl Iterator<Item = &SchemaConflict> {
    self.tables.iter().filter_map(|t| t.conflict.as_ref())
  }

  pub fn table(&self, name: &str) -> Option<&TableReport> {
    self.tables.iter().find(|t| t.table == name)
  }

  /// Nothing was created, changed, or refused.
  pub fn is_noop(&self) -> bool {
    self.tables
      .iter()
      .all(|t| !t.created && t.applied.is_empty() && t.conflict.is_none())
  }
}
