//! Normalised type descriptors.
//!
//! The differ never compares type strings directly. Both the declared
//! [`ColumnType`] and the type string reported by the live catalog are reduced
//! to a [`TypeDescriptor`] (kind + length) first, so that `varchar(200)`,
//! `VARCHAR( 200 )` and `CHARACTER VARYING(200)` are the same type.
//!
//! The reduction follows SQLite's storage rules: every integer spelling is
//! stored as the same 64-bit integer, so they share one kind and any display
//! width (`INT(11)`) is dropped.

use std::fmt;

use crate::schema::ColumnType;

/// The family a declared type belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
  Integer,
  Real,
  Boolean,
  Text,
  Varchar,
  Char,
  DateTime,
  Date,
  Blob,
  /// A spelling this module does not recognise, upper-cased with whitespace
  /// collapsed. Two `Other`s are equal only if their text is.
  Other(String),
}

/// A structured, comparable form of a column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
  pub kind:   TypeKind,
  /// Maximum length for character kinds; `None` elsewhere.
  pub length: Option<u32>,
}

impl TypeDescriptor {
  pub fn new(kind: TypeKind, length: Option<u32>) -> Self { Self { kind, length } }

  /// Parse a declared type string as reported by the database catalog.
  pub fn parse(decl: &str) -> Self {
    let normalised = decl
      .split_whitespace()
      .collect::<Vec<_>>()
      .join(" ")
      .to_ascii_uppercase();

    let (base, args) = match normalised.split_once('(') {
      Some((base, rest)) => (base.trim(), Some(rest.trim_end_matches(')'))),
      None => (normalised.as_str(), None),
    };

    // First argument only; precision/scale pairs are not modelled.
    let length = args
      .and_then(|a| a.split(',').next())
      .and_then(|a| a.trim().parse::<u32>().ok());

    let kind = match base {
      "INT" | "INTEGER" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT"
      | "UNSIGNED BIG INT" | "INT2" | "INT8" => {
        return Self::new(TypeKind::Integer, None);
      }
      "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => {
        return Self::new(TypeKind::Real, None);
      }
      "BOOLEAN" | "BOOL" => return Self::new(TypeKind::Boolean, None),
      "TEXT" | "CLOB" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => {
        return Self::new(TypeKind::Text, None);
      }
      "DATETIME" | "TIMESTAMP" => return Self::new(TypeKind::DateTime, None),
      "DATE" => return Self::new(TypeKind::Date, None),
      "BLOB" => return Self::new(TypeKind::Blob, None),
      "VARCHAR" | "CHARACTER VARYING" | "VARYING CHARACTER" | "NVARCHAR"
      | "NATIONAL VARYING CHARACTER" => TypeKind::Varchar,
      "CHAR" | "CHARACTER" | "NCHAR" | "NATIVE CHARACTER" => TypeKind::Char,
      _ => return Self::new(TypeKind::Other(normalised.clone()), None),
    };

    Self::new(kind, length)
  }
}

impl From<ColumnType> for TypeDescriptor {
  fn from(ty: ColumnType) -> Self {
    match ty {
      ColumnType::Integer | ColumnType::BigInteger => {
        Self::new(TypeKind::Integer, None)
      }
      ColumnType::Boolean => Self::new(TypeKind::Boolean, None),
      ColumnType::Text => Self::new(TypeKind::Text, None),
      ColumnType::Varchar(n) => Self::new(TypeKind::Varchar, Some(n)),
      ColumnType::DateTime => Self::new(TypeKind::DateTime, None),
    }
  }
}

impl fmt::Display for TypeDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match &self.kind {
      TypeKind::Integer => "integer",
      TypeKind::Real => "real",
      TypeKind::Boolean => "boolean",
      TypeKind::Text => "text",
      TypeKind::Varchar => "varchar",
      TypeKind::Char => "char",
      TypeKind::DateTime => "datetime",
      TypeKind::Date => "date",
      TypeKind::Blob => "blob",
      TypeKind::Other(s) => s.as_str(),
    };
    match self.length {
      Some(n) => write!(f, "{name}({n})"),
      None => f.write_str(name),
    }
  }
}
