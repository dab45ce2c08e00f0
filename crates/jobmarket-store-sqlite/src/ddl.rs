//! Rendering of the declared schema model to SQLite DDL.
//!
//! Every rendered type parses back to the same
//! [`TypeDescriptor`](jobmarket_core::descriptor::TypeDescriptor) as its
//! declaration, so a freshly created or rebuilt table never diffs against its
//! own model.

use jobmarket_core::schema::{ColumnDef, ColumnType, DefaultValue, Literal, LiveColumn, TableDef};

use crate::introspect::LiveForeignKey;

/// Quote an identifier for SQLite.
pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

fn quote_list(idents: &[String]) -> String {
  idents.iter().map(|i| quote(i)).collect::<Vec<_>>().join(", ")
}

pub fn render_type(column: &ColumnDef) -> String {
  // Only the exact spelling `INTEGER PRIMARY KEY` aliases the rowid.
  if column.primary_key {
    return "INTEGER".to_owned();
  }
  match column.ty {
    ColumnType::Integer => "INTEGER".to_owned(),
    ColumnType::BigInteger => "BIGINT".to_owned(),
    ColumnType::Boolean => "BOOLEAN".to_owned(),
    ColumnType::Text => "TEXT".to_owned(),
    ColumnType::Varchar(n) => format!("VARCHAR({n})"),
    ColumnType::DateTime => "DATETIME".to_owned(),
  }
}

fn render_literal(literal: &Literal) -> String {
  match literal {
    Literal::Integer(n) => n.to_string(),
    Literal::Boolean(b) => (if *b { "1" } else { "0" }).to_owned(),
    Literal::Text(s) => format!("'{}'", s.replace('\'', "''")),
  }
}

fn default_clause(default: &DefaultValue) -> Option<String> {
  match default {
    DefaultValue::None => None,
    DefaultValue::Value(literal) => Some(format!("DEFAULT {}", render_literal(literal))),
    DefaultValue::Now | DefaultValue::NowOnUpdate => {
      Some("DEFAULT CURRENT_TIMESTAMP".to_owned())
    }
  }
}

/// The column definition as it appears inside `CREATE TABLE`.
pub fn column_clause(column: &ColumnDef) -> String {
  let mut parts = vec![quote(&column.name), render_type(column)];
  if !column.nullable {
    parts.push("NOT NULL".to_owned());
  }
  if column.primary_key {
    parts.push("PRIMARY KEY AUTOINCREMENT".to_owned());
  } else if column.unique {
    parts.push("UNIQUE".to_owned());
  }
  parts.extend(default_clause(&column.default));
  parts.join(" ")
}

/// A live-only column rebuilt from its catalog entry, for when the table's
/// own text is unavailable. SQLite reports expression defaults without their
/// parentheses, so every default is wrapped.
pub fn live_column_clause(column: &LiveColumn) -> String {
  let mut clause = quote(&column.name);
  if !column.decl_type.is_empty() {
    clause.push(' ');
    clause.push_str(&column.decl_type);
  }
  if !column.nullable {
    clause.push_str(" NOT NULL");
  }
  if let Some(default) = &column.default {
    clause.push_str(&format!(" DEFAULT ({default})"));
  }
  clause
}

/// Live-only structure a rebuild carries into the new table.
#[derive(Debug, Default)]
pub struct Carried {
  /// Complete column definitions, placed after the declared columns.
  pub columns:      Vec<String>,
  pub foreign_keys: Vec<LiveForeignKey>,
  /// Table-level `CHECK` constraints.
  pub checks:       Vec<String>,
}

/// `CREATE TABLE` for `table`, under `name`, plus whatever `carried` brings
/// over from a table being rebuilt. Fails if `name` already exists.
pub fn create_table_sql(table: &TableDef, name: &str, carried: &Carried) -> String {
  let mut lines: Vec<String> = table.columns.iter().map(column_clause).collect();
  lines.extend(carried.columns.iter().cloned());

  for unique in &table.unique_constraints {
    let constraint = match &unique.name {
      Some(n) => format!("CONSTRAINT {} ", quote(n)),
      None => String::new(),
    };
    lines.push(format!("{constraint}UNIQUE ({})", quote_list(&unique.columns)));
  }

  for fk in &table.foreign_keys {
    let on_delete = if fk.on_delete_cascade { " ON DELETE CASCADE" } else { "" };
    lines.push(format!(
      "FOREIGN KEY ({}) REFERENCES {} ({}){on_delete}",
      quote(&fk.column),
      quote(&fk.references_table),
      quote(&fk.references_column),
    ));
  }

  for fk in &carried.foreign_keys {
    lines.push(format!(
      "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
      quote_list(&fk.from),
      quote(&fk.table),
      quote_list(&fk.to),
      fk.on_delete,
    ));
  }
  lines.extend(carried.checks.iter().cloned());

  format!("CREATE TABLE {} (\n  {}\n)", quote(name), lines.join(",\n  "))
}

/// `ALTER TABLE ADD COLUMN` for `column`, or `None` when SQLite cannot add it
/// in place: primary keys, non-constant defaults, and `NOT NULL` without a
/// constant default all need a rebuild instead.
///
/// A `UNIQUE` flag is not part of the statement; SQLite refuses it on
/// `ADD COLUMN`, so callers follow up with [`unique_index_sql`].
pub fn add_column_sql(table: &TableDef, column: &ColumnDef) -> Option<String> {
  if column.primary_key || column.default.is_now() {
    return None;
  }
  if !column.nullable && !matches!(column.default, DefaultValue::Value(_)) {
    return None;
  }

  let mut clause = vec![quote(&column.name), render_type(column)];
  if !column.nullable {
    clause.push("NOT NULL".to_owned());
  }
  clause.extend(default_clause(&column.default));
  if let Some(fk) = table.foreign_key_for(&column.name) {
    let on_delete = if fk.on_delete_cascade { " ON DELETE CASCADE" } else { "" };
    clause.push(format!(
      "REFERENCES {} ({}){on_delete}",
      quote(&fk.references_table),
      quote(&fk.references_column),
    ));
  }

  Some(format!("ALTER TABLE {} ADD COLUMN {}", quote(&table.name), clause.join(" ")))
}

pub fn unique_index_sql(table: &str, columns: &[String]) -> String {
  format!(
    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
    quote(&format!("uq_{table}_{}", columns.join("_"))),
    quote(table),
    quote_list(columns),
  )
}

/// A trigger that refreshes `column` whenever a row is updated without
/// setting it explicitly.
pub fn touch_trigger_sql(table: &str, column: &str) -> String {
  let t = quote(table);
  let c = quote(column);
  format!(
    "CREATE TRIGGER IF NOT EXISTS {trigger} AFTER UPDATE ON {t} FOR EACH ROW \
     WHEN NEW.{c} IS OLD.{c} \
     BEGIN UPDATE {t} SET {c} = CURRENT_TIMESTAMP WHERE rowid = NEW.rowid; END",
    trigger = quote(&format!("trg_{table}_{column}_touch")),
  )
}
