//! Read-only catalog queries.
//!
//! Everything here is computed fresh from `sqlite_master` and the `pragma_*`
//! table-valued functions on each call; nothing is cached between
//! reconciliation runs.

use jobmarket_core::schema::LiveColumn;
use rusqlite::{Connection, OptionalExtension as _};

use crate::Result;

/// A foreign key as the catalog reports it, grouped across its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveForeignKey {
  pub from:      Vec<String>,
  pub table:     String,
  pub to:        Vec<String>,
  /// `CASCADE`, `SET NULL`, `NO ACTION`, ...
  pub on_delete: String,
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

/// Column snapshots in table order.
pub fn live_columns(conn: &Connection, table: &str) -> Result<Vec<LiveColumn>> {
  let mut stmt = conn.prepare(
    "SELECT name, type, \"notnull\", dflt_value, pk
     FROM pragma_table_info(?1)
     ORDER BY cid",
  )?;
  let columns = stmt
    .query_map([table], |row| {
      Ok(LiveColumn {
        name:        row.get(0)?,
        decl_type:   row.get(1)?,
        nullable:    !row.get::<_, bool>(2)?,
        default:     row.get(3)?,
        primary_key: row.get::<_, i64>(4)? > 0,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(columns)
}

/// Column lists of the `UNIQUE` constraints written into the table
/// definition itself. Standalone unique indexes are covered by
/// [`dependent_objects`].
pub fn live_unique_constraints(conn: &Connection, table: &str) -> Result<Vec<Vec<String>>> {
  let mut list = conn.prepare(
    "SELECT name FROM pragma_index_list(?1)
     WHERE \"unique\" = 1 AND origin = 'u'
     ORDER BY seq",
  )?;
  let indexes = list
    .query_map([table], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
  indexes
    .iter()
    .map(|index| -> Result<Vec<String>> {
      Ok(
        info
          .query_map([index], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?,
      )
    })
    .collect()
}

pub fn live_foreign_keys(conn: &Connection, table: &str) -> Result<Vec<LiveForeignKey>> {
  let mut stmt = conn.prepare(
    "SELECT id, \"table\", \"from\", \"to\", on_delete
     FROM pragma_foreign_key_list(?1)
     ORDER BY id, seq",
  )?;
  let rows = stmt
    .query_map([table], |row| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, Option<String>>(3)?,
        row.get::<_, String>(4)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut keys: Vec<(i64, LiveForeignKey)> = vec![];
  for (id, target, from, to, on_delete) in rows {
    match keys.last_mut() {
      Some((last, fk)) if *last == id => {
        fk.from.push(from);
        fk.to.extend(to);
      }
      _ => keys.push((id, LiveForeignKey {
        from: vec![from],
        table: target,
        to: to.into_iter().collect(),
        on_delete,
      })),
    }
  }
  Ok(keys.into_iter().map(|(_, fk)| fk).collect())
}

/// The `CREATE` statements of explicit indexes and triggers on `table`,
/// indexes first. Dropping a table drops these, so a rebuild replays them.
pub fn dependent_objects(conn: &Connection, table: &str) -> Result<Vec<String>> {
  let mut stmt = conn.prepare(
    "SELECT sql FROM sqlite_master
     WHERE tbl_name = ?1 AND type IN ('index', 'trigger') AND sql IS NOT NULL
     ORDER BY type = 'trigger', name",
  )?;
  let sql = stmt
    .query_map([table], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(sql)
}

// ─── Table text ──────────────────────────────────────────────────────────────

/// The definitions inside a table's `CREATE TABLE` statement, as written.
///
/// The pragmas drop collations, `CHECK` constraints and generated columns, so
/// a rebuild takes live-only columns from here rather than from
/// [`live_columns`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableText {
  /// `(name, definition)` of every column, generated ones included.
  pub columns: Vec<(String, String)>,
  /// Table-level `CHECK` constraints.
  pub checks:  Vec<String>,
}

impl TableText {
  pub fn column(&self, name: &str) -> Option<&str> {
    self
      .columns
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, definition)| definition.as_str())
  }
}

/// The parsed `CREATE TABLE` text of `table`, or `None` if the table is
/// missing or its text cannot be split.
pub fn table_text(conn: &Connection, table: &str) -> Result<Option<TableText>> {
  let sql: Option<String> = conn
    .query_row(
      "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
      [table],
      |row| row.get(0),
    )
    .optional()?;
  Ok(sql.as_deref().and_then(parse_table_text))
}

fn parse_table_text(sql: &str) -> Option<TableText> {
  let mut text = TableText::default();
  for definition in definitions(sql)? {
    let (first, quoted, rest) = leading_word(definition)?;
    let keyword = if quoted { String::new() } else { first.to_ascii_uppercase() };
    match keyword.as_str() {
      "CHECK" => text.checks.push(definition.to_owned()),
      "CONSTRAINT" => {
        let (_, _, after_name) = leading_word(rest)?;
        if matches!(leading_word(after_name), Some((kw, false, _)) if kw.eq_ignore_ascii_case("CHECK")) {
          text.checks.push(definition.to_owned());
        }
      }
      "PRIMARY" | "UNIQUE" | "FOREIGN" => {}
      _ => text.columns.push((first, definition.to_owned())),
    }
  }
  Some(text)
}

/// The comma-separated definitions between the outermost parentheses of a
/// `CREATE TABLE` statement, trimmed.
fn definitions(sql: &str) -> Option<Vec<&str>> {
  let mut parts = vec![];
  let mut depth = 0usize;
  let mut start = 0;
  let mut quote: Option<char> = None;

  for (i, c) in sql.char_indices() {
    if let Some(close) = quote {
      if c == close {
        quote = None;
      }
      continue;
    }
    match c {
      '\'' | '"' | '`' => quote = Some(c),
      '[' => quote = Some(']'),
      '(' => {
        depth += 1;
        if depth == 1 {
          start = i + 1;
        }
      }
      ')' => {
        depth = depth.checked_sub(1)?;
        if depth == 0 {
          parts.push(sql[start..i].trim());
          return Some(parts);
        }
      }
      ',' if depth == 1 => {
        parts.push(sql[start..i].trim());
        start = i + 1;
      }
      _ => {}
    }
  }
  None
}

/// The first word of `s`, unquoted, whether it was quoted, and what follows.
fn leading_word(s: &str) -> Option<(String, bool, &str)> {
  let s = s.trim_start();
  let close = match s.chars().next()? {
    '"' => '"',
    '`' => '`',
    '[' => ']',
    _ => {
      let end = s
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(s.len());
      return Some((s[..end].to_owned(), false, &s[end..]));
    }
  };

  let mut word = String::new();
  let mut chars = s.char_indices().skip(1).peekable();
  while let Some((i, c)) = chars.next() {
    if c != close {
      word.push(c);
    } else if close != ']' && matches!(chars.peek(), Some((_, next)) if *next == close) {
      // A doubled quote stands for itself.
      word.push(c);
      chars.next();
    } else {
      return Some((word, true, &s[i + c.len_utf8()..]));
    }
  }
  None
}

/// Whether `keyword` appears in `definition` outside quotes.
pub fn has_keyword(definition: &str, keyword: &str) -> bool {
  let mut quote: Option<char> = None;
  let mut word = String::new();
  for c in definition.chars().chain([' ']) {
    if let Some(close) = quote {
      if c == close {
        quote = None;
      }
      continue;
    }
    if c.is_ascii_alphanumeric() || c == '_' {
      word.push(c);
      continue;
    }
    if word.eq_ignore_ascii_case(keyword) {
      return true;
    }
    word.clear();
    match c {
      '\'' | '"' | '`' => quote = Some(c),
      '[' => quote = Some(']'),
      _ => {}
    }
  }
  false
}

/// Rows violating foreign keys anywhere in the database.
pub fn foreign_key_violations(conn: &Connection) -> Result<usize> {
  let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
  let mut rows = stmt.query([])?;
  let mut count = 0;
  while rows.next()?.is_some() {
    count += 1;
  }
  Ok(count)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE parents (id INTEGER PRIMARY KEY, code varchar(10) NOT NULL DEFAULT 'x');
         CREATE TABLE children (
           id INTEGER PRIMARY KEY,
           parent_id BIGINT REFERENCES parents (id) ON DELETE CASCADE,
           a TEXT,
           b TEXT,
           UNIQUE (a, b)
         );
         CREATE INDEX children_a ON children (a);",
      )
      .unwrap();
    conn
  }

  #[test]
  fn reports_columns_in_order() {
    let conn = conn();
    let columns = live_columns(&conn, "parents").unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "id");
    assert!(columns[0].primary_key);
    assert_eq!(columns[1].decl_type, "varchar(10)");
    assert!(!columns[1].nullable);
    assert_eq!(columns[1].default.as_deref(), Some("'x'"));
  }

  #[test]
  fn missing_table_has_no_columns() {
    let conn = conn();
    assert!(!table_exists(&conn, "nope").unwrap());
    assert!(live_columns(&conn, "nope").unwrap().is_empty());
    assert!(table_exists(&conn, "parents").unwrap());
  }

  #[test]
  fn reports_inline_unique_constraints() {
    let conn = conn();
    assert_eq!(live_unique_constraints(&conn, "children").unwrap(), vec![vec![
      "a".to_owned(),
      "b".to_owned()
    ]]);
  }

  #[test]
  fn reports_foreign_keys() {
    let conn = conn();
    let fks = live_foreign_keys(&conn, "children").unwrap();
    assert_eq!(fks, vec![LiveForeignKey {
      from:      vec!["parent_id".into()],
      table:     "parents".into(),
      to:        vec!["id".into()],
      on_delete: "CASCADE".into(),
    }]);
  }

  #[test]
  fn table_text_keeps_clauses_the_pragmas_drop() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE tags (
           id INTEGER PRIMARY KEY,
           \"odd, name\" TEXT COLLATE NOCASE CHECK (length(\"odd, name\") < 10),
           size INTEGER GENERATED ALWAYS AS (length(\"odd, name\")) VIRTUAL,
           note TEXT DEFAULT 'a, (b)',
           UNIQUE (id, note),
           CONSTRAINT short_note CHECK (length(note) < 20),
           CHECK (id > 0)
         );",
      )
      .unwrap();

    let text = table_text(&conn, "tags").unwrap().unwrap();
    let names: Vec<_> = text.columns.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["id", "odd, name", "size", "note"]);
    assert_eq!(
      text.column("odd, name"),
      Some("\"odd, name\" TEXT COLLATE NOCASE CHECK (length(\"odd, name\") < 10)")
    );
    assert_eq!(text.column("note"), Some("note TEXT DEFAULT 'a, (b)'"));
    assert_eq!(text.checks, [
      "CONSTRAINT short_note CHECK (length(note) < 20)",
      "CHECK (id > 0)"
    ]);
    assert!(table_text(&conn, "nope").unwrap().is_none());
  }

  #[test]
  fn keywords_inside_quotes_do_not_count() {
    assert!(has_keyword("tag TEXT UNIQUE", "unique"));
    assert!(has_keyword("p INTEGER REFERENCES parents(id)", "REFERENCES"));
    assert!(!has_keyword("tag TEXT DEFAULT 'unique'", "UNIQUE"));
    assert!(!has_keyword("\"unique\" TEXT", "UNIQUE"));
    assert!(!has_keyword("uniqueness TEXT", "UNIQUE"));
  }

  #[test]
  fn reports_explicit_indexes_only() {
    let conn = conn();
    let objects = dependent_objects(&conn, "children").unwrap();
    assert_eq!(objects, vec!["CREATE INDEX children_a ON children (a)".to_owned()]);
  }
}
