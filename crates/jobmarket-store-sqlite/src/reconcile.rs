//! The schema applier: converges the live database on a declared [`Schema`].
//!
//! Missing tables are created first. Then, in one transaction with each table
//! under its own savepoint, the differ's additions run as `ALTER TABLE ADD
//! COLUMN` and everything SQLite cannot alter in place (type or nullability
//! changes, columns needing a non-constant default) is applied by rebuilding
//! the table. A rebuild keeps every live-only column, unique constraint,
//! foreign key, index and trigger, so nothing is ever removed.
//!
//! Foreign-key enforcement is off while the transaction runs: dropping a
//! referenced table during a rebuild would otherwise cascade into its
//! children. `legacy_alter_table` is on as well, so the rename that ends a
//! rebuild does not re-check views and triggers naming the table.

use std::{collections::HashSet, slice};

use jobmarket_core::{
  diff::{SchemaOp, diff},
  report::{ReconcileReport, SchemaConflict, TableReport},
  schema::{DefaultValue, Schema, TableDef},
};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, warn};

use crate::{
  Error, Result,
  ddl::{self, Carried, quote},
  error::is_schema_conflict,
  introspect,
};

/// Reconcile the database behind `conn` with `schema`.
///
/// Tables whose changes the existing data cannot accommodate are left
/// untouched and reported as conflicts; any other failure aborts the run and
/// commits nothing beyond the newly created tables. The connection's pragmas
/// are restored on every path.
pub fn reconcile(conn: &mut Connection, schema: &Schema) -> Result<ReconcileReport> {
  let created = create_missing_tables(conn, schema)?;

  let report = with_pragmas(
    conn,
    &[("foreign_keys", false), ("legacy_alter_table", true)],
    |conn| reconcile_tables(conn, schema, &created),
  )?;

  info!(
    "Schema reconciled: {} table(s) created, {} column operation(s), {} conflict(s)",
    report.created_tables().count(),
    report.operation_count(),
    report.conflicts().count(),
  );
  Ok(report)
}

fn create_missing_tables(conn: &mut Connection, schema: &Schema) -> Result<HashSet<String>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut created = HashSet::new();
  for table in schema.tables() {
    if introspect::table_exists(&tx, &table.name)? {
      continue;
    }
    tx.execute_batch(&ddl::create_table_sql(table, &table.name, &Carried::default()))?;
    ensure_touch_triggers(&tx, table)?;
    info!("Created table {}", table.name);
    created.insert(table.name.clone());
  }
  tx.commit()?;
  Ok(created)
}

/// Run `f` with each boolean pragma set as given, then put back every value
/// found beforehand, whether or not `f` succeeded.
fn with_pragmas<T>(
  conn: &mut Connection,
  pragmas: &[(&'static str, bool)],
  f: impl FnOnce(&mut Connection) -> Result<T>,
) -> Result<T> {
  let saved = pragmas
    .iter()
    .map(|&(name, _)| -> Result<(&'static str, bool)> {
      Ok((name, conn.pragma_query_value(None, name, |row| row.get(0))?))
    })
    .collect::<Result<Vec<_>>>()?;

  let result = pragmas
    .iter()
    .try_for_each(|&(name, value)| conn.pragma_update(None, name, value))
    .map_err(Error::from)
    .and_then(|()| f(conn));

  let restored: Vec<rusqlite::Result<()>> = saved
    .iter()
    .map(|&(name, value)| conn.pragma_update(None, name, value))
    .collect();
  let value = result?;
  restored.into_iter().collect::<rusqlite::Result<()>>()?;
  Ok(value)
}

fn reconcile_tables(
  conn: &mut Connection,
  schema: &Schema,
  created: &HashSet<String>,
) -> Result<ReconcileReport> {
  let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut report = ReconcileReport::default();

  for table in schema.tables() {
    let mut entry = TableReport {
      table: table.name.clone(),
      created: created.contains(&table.name),
      ..TableReport::default()
    };

    // Dropping the savepoint without committing rolls this table back.
    let savepoint = tx.savepoint()?;
    match reconcile_table(&savepoint, table) {
      Ok(applied) => {
        savepoint.commit()?;
        entry.applied = applied;
      }
      Err(Error::SchemaConflict(conflict)) => {
        warn!("{conflict}; leaving table {} unchanged", table.name);
        entry.conflict = Some(conflict);
      }
      Err(e) => return Err(e),
    }
    report.tables.push(entry);
  }

  let violations = introspect::foreign_key_violations(&tx)?;
  if violations > 0 {
    warn!("{violations} row(s) violate foreign keys after reconciliation");
  }

  tx.commit()?;
  Ok(report)
}

/// Apply the differ's operations for one table and return them.
fn reconcile_table(conn: &Connection, table: &TableDef) -> Result<Vec<SchemaOp>> {
  let live = introspect::live_columns(conn, &table.name)?;
  let ops = diff(table, &live);

  let mut rebuild: Vec<&SchemaOp> = vec![];
  for op in &ops {
    match op {
      SchemaOp::AddColumn { column, .. } => match ddl::add_column_sql(table, column) {
        Some(sql) => {
          conn.execute_batch(&sql).map_err(|e| conflict(table, &[op], e.into()))?;
          if column.unique {
            let index = ddl::unique_index_sql(&table.name, slice::from_ref(&column.name));
            conn.execute_batch(&index).map_err(|e| conflict(table, &[op], e.into()))?;
          }
          info!("Applied {op}");
        }
        None => rebuild.push(op),
      },
      SchemaOp::AlterColumn { .. } => rebuild.push(op),
    }
  }

  if !rebuild.is_empty() {
    rebuild_table(conn, table).map_err(|e| conflict(table, &rebuild, e))?;
    for op in &rebuild {
      info!("Applied {op} by rebuilding {}", table.name);
    }
  }

  ensure_touch_triggers(conn, table)?;
  Ok(ops)
}

/// Create the refresh trigger of every on-update timestamp column.
fn ensure_touch_triggers(conn: &Connection, table: &TableDef) -> Result<()> {
  for column in &table.columns {
    if column.default == DefaultValue::NowOnUpdate {
      conn.execute_batch(&ddl::touch_trigger_sql(&table.name, &column.name))?;
    }
  }
  Ok(())
}

/// Recreate `table` from its declaration plus its live-only structure, and
/// copy every row across.
///
/// Live-only columns keep their definitions as written, so their collations,
/// checks, and generation expressions survive. Their inline `UNIQUE` and
/// `REFERENCES` clauses come along with that text and are not added again.
fn rebuild_table(conn: &Connection, table: &TableDef) -> Result<()> {
  let name = &table.name;
  let live = introspect::live_columns(conn, name)?;
  let text = introspect::table_text(conn, name)?;

  let mut carried = Carried::default();
  let mut inline_unique: HashSet<&str> = HashSet::new();
  let mut inline_references: HashSet<&str> = HashSet::new();
  match &text {
    Some(text) => {
      for (column, definition) in &text.columns {
        if table.get_column(column).is_some() {
          continue;
        }
        if introspect::has_keyword(definition, "UNIQUE") {
          inline_unique.insert(column.as_str());
        }
        if introspect::has_keyword(definition, "REFERENCES") {
          inline_references.insert(column.as_str());
        }
        carried.columns.push(definition.clone());
      }
      carried.checks = text.checks.clone();
    }
    None => {
      carried.columns = live
        .iter()
        .filter(|c| table.get_column(&c.name).is_none())
        .map(ddl::live_column_clause)
        .collect();
    }
  }

  let single = |columns: &[String], set: &HashSet<&str>| {
    matches!(columns, [c] if set.contains(c.as_str()))
  };

  carried.foreign_keys = introspect::live_foreign_keys(conn, name)?
    .into_iter()
    .filter(|fk| !matches!(fk.from.as_slice(), [c] if table.foreign_key_for(c).is_some()))
    .filter(|fk| !single(fk.from.as_slice(), &inline_references))
    .collect();

  let extra_uniques: Vec<Vec<String>> = introspect::live_unique_constraints(conn, name)?
    .into_iter()
    .filter(|columns| !table.declares_unique(columns))
    .filter(|columns| !single(columns.as_slice(), &inline_unique))
    .collect();

  let dependents = introspect::dependent_objects(conn, name)?;

  let staging = format!("{name}__rebuild");
  conn.execute_batch(&ddl::create_table_sql(table, &staging, &carried))?;

  let copied = live.iter().map(|c| quote(&c.name)).collect::<Vec<_>>().join(", ");
  conn.execute_batch(&format!(
    "INSERT INTO {staging} ({copied}) SELECT {copied} FROM {original};
     DROP TABLE {original};
     ALTER TABLE {staging} RENAME TO {original};",
    staging = quote(&staging),
    original = quote(name),
  ))?;

  for sql in &dependents {
    conn.execute_batch(sql)?;
  }
  for columns in &extra_uniques {
    conn.execute_batch(&ddl::unique_index_sql(name, columns))?;
  }
  Ok(())
}

/// Turn a failure caused by the table's data into a [`SchemaConflict`]; pass
/// anything else through.
fn conflict(table: &TableDef, ops: &[&SchemaOp], err: Error) -> Error {
  let Error::Sqlite(e) = &err else { return err };
  if !is_schema_conflict(e) {
    return err;
  }

  let mut verbs: Vec<&str> = ops.iter().map(|op| op.verb()).collect();
  verbs.dedup();
  SchemaConflict {
    table:     table.name.clone(),
    column:    ops.iter().map(|op| op.column().name.as_str()).collect::<Vec<_>>().join(", "),
    operation: verbs.join(" / "),
    reason:    e.to_string(),
  }
  .into()
}

#[cfg(test)]
mod tests {
  use jobmarket_core::{
    model::{self, job_market_schema},
    schema::{ColumnDef, ColumnType},
  };

  use super::*;

  fn conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", true).unwrap();
    conn
  }

  fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
  }

  #[test]
  fn creates_every_table_then_is_idempotent() {
    let mut conn = conn();
    let schema = job_market_schema().unwrap();

    let first = reconcile(&mut conn, &schema).unwrap();
    assert_eq!(first.created_tables().count(), 5);
    assert_eq!(first.operation_count(), 0);

    let second = reconcile(&mut conn, &schema).unwrap();
    assert!(second.is_noop(), "{second:?}");
  }

  fn pragma(conn: &Connection, name: &str) -> bool {
    conn.pragma_query_value(None, name, |row| row.get(0)).unwrap()
  }

  #[test]
  fn pragmas_are_restored() {
    let mut conn = conn();
    reconcile(&mut conn, &job_market_schema().unwrap()).unwrap();
    assert!(pragma(&conn, "foreign_keys"));
    assert!(!pragma(&conn, "legacy_alter_table"));
  }

  #[test]
  fn pragmas_are_restored_when_reconciliation_fails() {
    let mut conn = conn();
    let result: Result<()> = with_pragmas(
      &mut conn,
      &[("foreign_keys", false), ("legacy_alter_table", true)],
      |conn| {
        assert!(!pragma(conn, "foreign_keys"));
        assert!(pragma(conn, "legacy_alter_table"));
        Err(Error::Integrity("boom".into()))
      },
    );
    assert!(matches!(result, Err(Error::Integrity(_))));
    assert!(pragma(&conn, "foreign_keys"));
    assert!(!pragma(&conn, "legacy_alter_table"));
  }

  #[test]
  fn rebuild_keeps_children_of_rebuilt_parent() {
    let mut conn = conn();
    let schema = job_market_schema().unwrap();
    reconcile(&mut conn, &schema).unwrap();
    conn
      .execute_batch(
        "INSERT INTO jobs (job_title, company_name, job_url) VALUES ('t', 'c', 'u');
         INSERT INTO skills (name) VALUES ('Go');
         INSERT INTO jobs_skills (job_id, skill_id) VALUES (1, 1);",
      )
      .unwrap();

    // Widen `job_title`, which forces `jobs` to be rebuilt.
    let mut tables = schema.tables().to_vec();
    tables[0].columns[1] = ColumnDef::new("job_title", ColumnType::Varchar(400)).not_null();
    let widened = Schema::new(tables).unwrap();

    let report = reconcile(&mut conn, &widened).unwrap();
    assert_eq!(report.table(model::JOBS).unwrap().applied.len(), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM jobs_skills"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM jobs"), 1);

    // The rebuilt table is still the parent the edges cascade from.
    conn.execute_batch("DELETE FROM jobs").unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM jobs_skills"), 0);
  }

  #[test]
  fn rebuild_preserves_updated_at_trigger() {
    let mut conn = conn();
    let schema = job_market_schema().unwrap();
    reconcile(&mut conn, &schema).unwrap();

    let mut tables = schema.tables().to_vec();
    tables[2].columns[1] = ColumnDef::new("name", ColumnType::Varchar(300)).not_null().unique();
    reconcile(&mut conn, &Schema::new(tables).unwrap()).unwrap();

    assert_eq!(
      count(
        &conn,
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type = 'trigger' AND name = 'trg_skills_updated_at_touch'"
      ),
      1
    );
  }

  #[test]
  fn added_unique_column_gets_unique_index() {
    let mut conn = conn();
    let schema = job_market_schema().unwrap();
    reconcile(&mut conn, &schema).unwrap();

    let mut tables = schema.tables().to_vec();
    tables[2] = tables[2]
      .clone()
      .column(ColumnDef::new("slug", ColumnType::Varchar(50)).unique());
    let report = reconcile(&mut conn, &Schema::new(tables).unwrap()).unwrap();
    assert_eq!(report.operation_count(), 1);

    conn.execute_batch("INSERT INTO skills (name, slug) VALUES ('Go', 'go')").unwrap();
    let dup = conn.execute_batch("INSERT INTO skills (name, slug) VALUES ('Golang', 'go')");
    assert!(dup.is_err());
  }
}
