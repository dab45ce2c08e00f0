//! Get-or-create resolution of entities by natural key.
//!
//! No row lock is taken. Two writers resolving the same new key may both try
//! the insert; the loser gets a uniqueness violation, re-queries once, and
//! uses the winner's row. A violation that the re-query cannot explain came
//! from some other unique constraint and is reported as it stands.

use jobmarket_core::{job::NewCategory, model};
use rusqlite::{Connection, OptionalExtension as _, ToSql, TransactionBehavior, params_from_iter};
use tracing::{debug, info};

use crate::{
  Error, Result,
  ddl::quote,
  error::unique_violation,
};

/// An entity that can be looked up by natural key and created on demand.
pub trait Resolvable {
  const TABLE: &'static str;

  /// Columns and values that identify the row.
  fn natural_key(&self) -> Vec<(&'static str, &dyn ToSql)>;

  /// Further columns written only when the row is created.
  fn attributes(&self) -> Vec<(&'static str, &dyn ToSql)> { Vec::new() }

  /// Short human-readable form for logs and errors.
  fn describe(&self) -> String;
}

/// A skill, keyed by its name.
impl Resolvable for String {
  const TABLE: &'static str = model::SKILLS;

  fn natural_key(&self) -> Vec<(&'static str, &dyn ToSql)> { vec![("name", self as &dyn ToSql)] }

  fn describe(&self) -> String { self.clone() }
}

impl Resolvable for NewCategory {
  const TABLE: &'static str = model::CATEGORIES;

  fn natural_key(&self) -> Vec<(&'static str, &dyn ToSql)> {
    vec![
      ("platform", &self.platform as &dyn ToSql),
      ("category_id", &self.category_id as &dyn ToSql),
      ("sub_category_id", &self.sub_category_id as &dyn ToSql),
    ]
  }

  fn attributes(&self) -> Vec<(&'static str, &dyn ToSql)> {
    vec![
      ("category_name", &self.category_name as &dyn ToSql),
      ("sub_category_name", &self.sub_category_name as &dyn ToSql),
    ]
  }

  fn describe(&self) -> String {
    format!("{}/{}/{}", self.platform, self.category_id, self.sub_category_id)
  }
}

/// Return the id of the row matching `item`'s natural key, inserting it if
/// absent. Runs on whatever transaction `conn` belongs to.
pub fn resolve<R: Resolvable>(conn: &Connection, item: &R) -> Result<i64> {
  let key = item.natural_key();
  let attributes = item.attributes();

  let select = format!(
    "SELECT id FROM {} WHERE {}",
    quote(R::TABLE),
    key
      .iter()
      .enumerate()
      .map(|(i, (column, _))| format!("{} = ?{}", quote(column), i + 1))
      .collect::<Vec<_>>()
      .join(" AND "),
  );

  let columns: Vec<_> = key.iter().chain(attributes.iter()).collect();
  let insert = format!(
    "INSERT INTO {} ({}) VALUES ({})",
    quote(R::TABLE),
    columns.iter().map(|(c, _)| quote(c)).collect::<Vec<_>>().join(", "),
    (1..=columns.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", "),
  );

  get_or_create(
    || {
      conn
        .query_row(&select, params_from_iter(key.iter().map(|(_, v)| v)), |row| {
          row.get(0)
        })
        .optional()
    },
    || {
      conn.execute(&insert, params_from_iter(columns.iter().map(|(_, v)| v)))?;
      let id = conn.last_insert_rowid();
      info!("Created {} row {id} for {}", R::TABLE, item.describe());
      Ok(id)
    },
  )
  .map_err(|err| match err {
    ResolveError::Unexplained(msg) => Error::Integrity(format!(
      "cannot resolve {} {:?}: {msg}",
      R::TABLE,
      item.describe(),
    )),
    ResolveError::Sqlite(e) => Error::from_write(e),
  })
}

/// [`resolve`] in a transaction of its own.
pub fn resolve_committed<R: Resolvable>(conn: &mut Connection, item: &R) -> Result<i64> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let id = resolve(&tx, item)?;
  tx.commit()?;
  Ok(id)
}

#[derive(Debug)]
enum ResolveError {
  /// The insert hit a uniqueness violation, yet no row has the key.
  Unexplained(String),
  Sqlite(rusqlite::Error),
}

/// Find, then insert. A uniqueness violation on `create` means a concurrent
/// writer won the race, and the second `find` sees its row.
fn get_or_create(
  find: impl Fn() -> rusqlite::Result<Option<i64>>,
  create: impl FnOnce() -> rusqlite::Result<i64>,
) -> Result<i64, ResolveError> {
  if let Some(id) = find().map_err(ResolveError::Sqlite)? {
    return Ok(id);
  }
  let violation = match create() {
    Ok(id) => return Ok(id),
    Err(e) => match unique_violation(&e) {
      Some(msg) => msg.to_owned(),
      None => return Err(ResolveError::Sqlite(e)),
    },
  };

  debug!("Lost insert race ({violation}); re-querying");
  find()
    .map_err(ResolveError::Sqlite)?
    .ok_or(ResolveError::Unexplained(violation))
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use rusqlite::ffi;

  use super::*;

  fn unique_failure() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
      ffi::Error::new(ffi::SQLITE_CONSTRAINT_UNIQUE),
      Some("UNIQUE constraint failed: skills.name".to_owned()),
    )
  }

  #[test]
  fn existing_row_is_found_without_insert() {
    let creates = Cell::new(0);
    let id = get_or_create(
      || Ok(Some(7)),
      || {
        creates.set(creates.get() + 1);
        Ok(99)
      },
    )
    .unwrap();
    assert_eq!(id, 7);
    assert_eq!(creates.get(), 0);
  }

  #[test]
  fn lost_race_requeries_once() {
    let finds = Cell::new(0);
    let id = get_or_create(
      || {
        finds.set(finds.get() + 1);
        Ok(if finds.get() == 1 { None } else { Some(42) })
      },
      || Err(unique_failure()),
    )
    .unwrap();
    assert_eq!(id, 42);
    assert_eq!(finds.get(), 2);
  }

  #[test]
  fn violation_without_matching_row_is_reported() {
    let finds = Cell::new(0);
    let result = get_or_create(
      || {
        finds.set(finds.get() + 1);
        Ok(None)
      },
      || Err(unique_failure()),
    );
    assert!(matches!(
      result,
      Err(ResolveError::Unexplained(msg)) if msg == "UNIQUE constraint failed: skills.name"
    ));
    assert_eq!(finds.get(), 2);
  }

  #[test]
  fn other_errors_are_not_retried() {
    let creates = Cell::new(0);
    let result = get_or_create(
      || Ok(None),
      || {
        creates.set(creates.get() + 1);
        Err(rusqlite::Error::SqliteFailure(
          ffi::Error::new(ffi::SQLITE_CONSTRAINT_NOTNULL),
          None,
        ))
      },
    );
    assert!(matches!(result, Err(ResolveError::Sqlite(_))));
    assert_eq!(creates.get(), 1);
  }

  #[test]
  fn resolves_skill_against_real_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch("CREATE TABLE skills (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)")
      .unwrap();

    let first = resolve(&conn, &"Rust".to_owned()).unwrap();
    let again = resolve(&conn, &"Rust".to_owned()).unwrap();
    let other = resolve(&conn, &"rust".to_owned()).unwrap();
    assert_eq!(first, again);
    assert_ne!(first, other);
  }

  #[test]
  fn unique_column_outside_key_is_an_integrity_error() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE skills (
           id INTEGER PRIMARY KEY,
           name TEXT NOT NULL UNIQUE,
           slot INTEGER NOT NULL DEFAULT 0 UNIQUE
         )",
      )
      .unwrap();

    resolve(&conn, &"Rust".to_owned()).unwrap();
    let err = resolve(&conn, &"Go".to_owned()).unwrap_err();
    assert!(
      matches!(&err, Error::Integrity(msg) if msg.contains("skills.slot")),
      "{err:?}"
    );
  }
}
