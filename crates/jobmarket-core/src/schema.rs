//! The declarative table model.
//!
//! A [`Schema`] is built once at process start and never mutated afterwards.
//! Storage backends render it to DDL, and the differ compares it against
//! [`LiveColumn`] snapshots read from the database catalog.

use std::collections::HashSet;

use crate::{Error, Result, descriptor::TypeDescriptor};

// ─── Column types ────────────────────────────────────────────────────────────

/// Semantic column type, independent of any SQL spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Integer,
  BigInteger,
  Boolean,
  Text,
  /// A string bounded to the given number of characters.
  Varchar(u32),
  DateTime,
}

impl ColumnType {
  pub fn descriptor(self) -> TypeDescriptor { TypeDescriptor::from(self) }
}

/// A constant usable as a column default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
  Integer(i64),
  Boolean(bool),
  Text(String),
}

/// How a column is populated when the writer does not supply a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DefaultValue {
  #[default]
  None,
  Value(Literal),
  /// The current timestamp at insert.
  Now,
  /// The current timestamp at insert, refreshed on every update of the row.
  NowOnUpdate,
}

impl DefaultValue {
  pub fn is_now(&self) -> bool { matches!(self, Self::Now | Self::NowOnUpdate) }
}

// ─── Columns ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
  pub name:        String,
  pub ty:          ColumnType,
  pub nullable:    bool,
  pub default:     DefaultValue,
  /// A surrogate, auto-incrementing integer key.
  pub primary_key: bool,
  pub unique:      bool,
}

impl ColumnDef {
  /// A nullable column with no default and no constraints.
  pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
    Self {
      name: name.into(),
      ty,
      nullable: true,
      default: DefaultValue::None,
      primary_key: false,
      unique: false,
    }
  }

  /// The conventional `id` surrogate key.
  pub fn id() -> Self { Self::new("id", ColumnType::BigInteger).primary_key() }

  pub fn not_null(mut self) -> Self {
    self.nullable = false;
    self
  }

  pub fn unique(mut self) -> Self {
    self.unique = true;
    self
  }

  pub fn primary_key(mut self) -> Self {
    self.primary_key = true;
    self.nullable = false;
    self
  }

  pub fn default_value(mut self, default: DefaultValue) -> Self {
    self.default = default;
    self
  }

  pub fn shape(&self) -> ColumnShape {
    ColumnShape { ty: self.ty.descriptor(), nullable: self.nullable }
  }
}

/// The part of a column the differ compares: normalised type and
/// nullability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
  pub ty:       TypeDescriptor,
  pub nullable: bool,
}

/// A column as reported by the live database catalog.
///
/// Produced fresh on every reconciliation pass; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
  pub name:        String,
  /// The declared type exactly as the catalog reports it.
  pub decl_type:   String,
  pub nullable:    bool,
  /// Default expression as SQL text, if any.
  pub default:     Option<String>,
  pub primary_key: bool,
}

impl LiveColumn {
  pub fn new(name: impl Into<String>, decl_type: impl Into<String>, nullable: bool) -> Self {
    Self {
      name: name.into(),
      decl_type: decl_type.into(),
      nullable,
      default: None,
      primary_key: false,
    }
  }

  /// A primary-key column counts as `NOT NULL` whether or not the catalog
  /// says so; SQLite never stores a null rowid alias.
  pub fn shape(&self) -> ColumnShape {
    ColumnShape {
      ty:       TypeDescriptor::parse(&self.decl_type),
      nullable: self.nullable && !self.primary_key,
    }
  }
}

// ─── Table constraints ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
  pub name:    Option<String>,
  pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
  pub column:            String,
  pub references_table:  String,
  pub references_column: String,
  pub on_delete_cascade: bool,
}

// ─── Tables ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
  pub name:               String,
  /// In declaration order; operations on the table follow this order.
  pub columns:            Vec<ColumnDef>,
  pub unique_constraints: Vec<UniqueConstraint>,
  pub foreign_keys:       Vec<ForeignKey>,
}

impl TableDef {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:               name.into(),
      columns:            Vec::new(),
      unique_constraints: Vec::new(),
      foreign_keys:       Vec::new(),
    }
  }

  pub fn column(mut self, column: ColumnDef) -> Self {
    self.columns.push(column);
    self
  }

  /// Add a multi-column unique constraint.
  pub fn unique_together(mut self, name: Option<&str>, columns: &[&str]) -> Self {
    self.unique_constraints.push(UniqueConstraint {
      name:    name.map(str::to_owned),
      columns: columns.iter().map(|c| (*c).to_owned()).collect(),
    });
    self
  }

  /// Declare `column` as referencing `table.referenced`, deleting the row when
  /// the referenced row is deleted.
  pub fn references(mut self, column: &str, table: &str, referenced: &str) -> Self {
    self.foreign_keys.push(ForeignKey {
      column:            column.to_owned(),
      references_table:  table.to_owned(),
      references_column: referenced.to_owned(),
      on_delete_cascade: true,
    });
    self
  }

  pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
    self.columns.iter().find(|c| c.name == name)
  }

  pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKey> {
    self.foreign_keys.iter().find(|fk| fk.column == column)
  }

  /// Whether `columns` is already unique through a declared column flag or
  /// table constraint.
  pub fn declares_unique(&self, columns: &[String]) -> bool {
    if let [single] = columns
      && self.get_column(single).is_some_and(|c| c.unique || c.primary_key)
    {
      return true;
    }
    self.unique_constraints.iter().any(|u| u.columns == columns)
  }

  fn validate(&self) -> Result<()> {
    let mut seen = HashSet::new();
    for column in &self.columns {
      if !seen.insert(column.name.as_str()) {
        return Err(Error::DuplicateColumn {
          table:  self.name.clone(),
          column: column.name.clone(),
        });
      }
    }

    let constrained = self
      .unique_constraints
      .iter()
      .flat_map(|u| u.columns.iter())
      .chain(self.foreign_keys.iter().map(|fk| &fk.column));
    for column in constrained {
      if !seen.contains(column.as_str()) {
        return Err(Error::UnknownColumn {
          table:  self.name.clone(),
          column: column.clone(),
        });
      }
    }

    if self.unique_constraints.iter().any(|u| u.columns.is_empty()) {
      return Err(Error::EmptyConstraint(self.name.clone()));
    }
    Ok(())
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// A validated, ordered set of table definitions.
///
/// Tables are created in declaration order, so a table may only reference
/// tables declared before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
  tables: Vec<TableDef>,
}

impl Schema {
  pub fn new(tables: Vec<TableDef>) -> Result<Self> {
    let mut declared: HashSet<&str> = HashSet::new();
    for table in &tables {
      table.validate()?;
      for fk in &table.foreign_keys {
        let target = fk.references_table.as_str();
        let known = declared.contains(target) || target == table.name;
        if !known {
          return Err(Error::UnknownReference {
            table:      table.name.clone(),
            references: target.to_owned(),
          });
        }
      }
      if !declared.insert(table.name.as_str()) {
        return Err(Error::DuplicateTable(table.name.clone()));
      }
    }
    Ok(Self { tables })
  }

  pub fn tables(&self) -> &[TableDef] { &self.tables }

  pub fn table(&self, name: &str) -> Option<&TableDef> {
    self.tables.iter().find(|t| t.name == name)
  }
}
