//! Schema diff: declared table → minimal additive operations.
//!
//! Computes the column additions and alterations needed to bring a live table
//! in line with its [`TableDef`]. Live columns the model does not declare are
//! never reported, and no operation ever drops, renames or removes anything.

use std::fmt;

use crate::schema::{ColumnDef, LiveColumn, TableDef};

/// A single corrective operation against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOp {
  /// The declared column is missing from the live table.
  AddColumn { table: String, column: ColumnDef },
  /// The live column's type or nullability differs from the declaration.
  AlterColumn {
    table:  String,
    column: ColumnDef,
    /// The snapshot being replaced.
    live:   LiveColumn,
  },
}

impl SchemaOp {
  pub fn table(&self) -> &str {
    match self {
      Self::AddColumn { table, .. } | Self::AlterColumn { table, .. } => table,
    }
  }

  pub fn column(&self) -> &ColumnDef {
    match self {
      Self::AddColumn { column, .. } | Self::AlterColumn { column, .. } => column,
    }
  }

  pub fn verb(&self) -> &'static str {
    match self {
      Self::AddColumn { .. } => "add column",
      Self::AlterColumn { .. } => "alter column",
    }
  }
}

impl fmt::Display for SchemaOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let column = self.column();
    let shape = column.shape();
    let null = if shape.nullable { "null" } else { "not null" };
    write!(f, "{} {}.{} {} {null}", self.verb(), self.table(), column.name, shape.ty)?;
    if let Self::AlterColumn { live, .. } = self {
      let was = live.shape();
      let was_null = if was.nullable { "null" } else { "not null" };
      write!(f, " (was {} {was_null})", was.ty)?;
    }
    Ok(())
  }
}

/// Compare `table` against the live columns of the same table.
///
/// All additions come first, then all alterations, each in the table's
/// declaration order, so a column is never altered before it exists.
pub fn diff(table: &TableDef, live: &[LiveColumn]) -> Vec<SchemaOp> {
  let mut additions = vec![];
  let mut alterations = vec![];

  for column in &table.columns {
    match live.iter().find(|l| l.name == column.name) {
      None => additions.push(SchemaOp::AddColumn {
        table:  table.name.clone(),
        column: column.clone(),
      }),
      Some(existing) if existing.shape() != column.shape() => {
        alterations.push(SchemaOp::AlterColumn {
          table:  table.name.clone(),
          column: column.clone(),
          live:   existing.clone(),
        });
      }
      Some(_) => {}
    }
  }

  additions.extend(alterations);
  additions
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::{ColumnType, DefaultValue};

  fn jobs() -> TableDef {
    TableDef::new("jobs")
      .column(ColumnDef::id())
      .column(ColumnDef::new("job_title", ColumnType::Varchar(200)).not_null())
      .column(ColumnDef::new("city", ColumnType::Varchar(50)))
      .column(ColumnDef::new("remote_allowed", ColumnType::Boolean))
      .column(
        ColumnDef::new("created_at", ColumnType::DateTime)
          .default_value(DefaultValue::Now),
      )
  }

  fn live_matching() -> Vec<LiveColumn> {
    vec![
      LiveColumn::new("id", "INTEGER", false),
      LiveColumn::new("job_title", "VARCHAR(200)", false),
      LiveColumn::new("city", "VARCHAR(50)", true),
      LiveColumn::new("remote_allowed", "BOOLEAN", true),
      LiveColumn::new("created_at", "DATETIME", true),
    ]
  }

  #[test]
  fn identical_table_yields_nothing() {
    assert!(diff(&jobs(), &live_matching()).is_empty());
  }

  #[test]
  fn missing_column_is_added() {
    let live: Vec<_> = live_matching()
      .into_iter()
      .filter(|c| c.name != "remote_allowed")
      .collect();

    let ops = diff(&jobs(), &live);
    assert_eq!(ops.len(), 1);
    match &ops[0] {
      SchemaOp::AddColumn { table, column } => {
        assert_eq!(table, "jobs");
        assert_eq!(column.name, "remote_allowed");
        assert!(column.nullable);
      }
      other => panic!("expected AddColumn, got {other:?}"),
    }
  }

  #[test]
  fn widened_varchar_is_altered() {
    let mut live = live_matching();
    live[2].decl_type = "VARCHAR(20)".into();

    let ops = diff(&jobs(), &live);
    assert_eq!(ops.len(), 1);
    assert!(matches!(
      &ops[0],
      SchemaOp::AlterColumn { column, live, .. }
        if column.name == "city" && live.decl_type == "VARCHAR(20)"
    ));
  }

  #[test]
  fn nullability_change_is_altered() {
    let mut live = live_matching();
    live[1].nullable = true;

    let ops = diff(&jobs(), &live);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].verb(), "alter column");
    assert_eq!(ops[0].column().name, "job_title");
  }

  #[test]
  fn equivalent_spellings_are_not_altered() {
    let live = vec![
      LiveColumn::new("id", "bigint", false),
      LiveColumn::new("job_title", "character varying( 200 )", false),
      LiveColumn::new("city", "varchar(50)", true),
      LiveColumn::new("remote_allowed", "bool", true),
      LiveColumn::new("created_at", "timestamp", true),
    ];
    assert!(diff(&jobs(), &live).is_empty());
  }

  #[test]
  fn live_only_columns_are_ignored() {
    let mut live = live_matching();
    live.push(LiveColumn::new("scrape_batch", "TEXT", false));
    assert!(diff(&jobs(), &live).is_empty());
  }

  #[test]
  fn additions_precede_alterations_in_declaration_order() {
    let live = vec![
      LiveColumn::new("id", "INTEGER", false),
      LiveColumn::new("job_title", "TEXT", false),
      LiveColumn::new("created_at", "TEXT", true),
    ];

    let ops = diff(&jobs(), &live);
    let summary: Vec<_> = ops
      .iter()
      .map(|op| (op.verb(), op.column().name.as_str()))
      .collect();
    assert_eq!(summary, [
      ("add column", "city"),
      ("add column", "remote_allowed"),
      ("alter column", "job_title"),
      ("alter column", "created_at"),
    ]);
  }

  #[test]
  fn empty_live_table_adds_everything() {
    let ops = diff(&jobs(), &[]);
    assert_eq!(ops.len(), jobs().columns.len());
    assert!(ops.iter().all(|op| matches!(op, SchemaOp::AddColumn { .. })));
  }

  #[test]
  fn display_describes_alteration() {
    let mut live = live_matching();
    live[2].decl_type = "VARCHAR(20)".into();
    let ops = diff(&jobs(), &live);
    assert_eq!(
      ops[0].to_string(),
      "alter column jobs.city varchar(50) null (was varchar(20) null)"
    );
  }
}
