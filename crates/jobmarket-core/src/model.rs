//! The declared job market schema.
//!
//! Five tables: `jobs`, `categories`, `skills`, and the two association
//! tables linking jobs to them. Parents are declared before the tables that
//! reference them.

use crate::{
  Result,
  schema::{ColumnDef, ColumnType, DefaultValue, Schema, TableDef},
};

pub const JOBS: &str = "jobs";
pub const CATEGORIES: &str = "categories";
pub const SKILLS: &str = "skills";
pub const JOBS_CATEGORIES: &str = "jobs_categories";
pub const JOBS_SKILLS: &str = "jobs_skills";

/// Append the `created_at` / `updated_at` bookkeeping columns.
fn timestamped(table: TableDef) -> TableDef {
  table
    .column(
      ColumnDef::new("created_at", ColumnType::DateTime)
        .default_value(DefaultValue::Now),
    )
    .column(
      ColumnDef::new("updated_at", ColumnType::DateTime)
        .default_value(DefaultValue::NowOnUpdate),
    )
}

fn varchar(name: &str, len: u32) -> ColumnDef {
  ColumnDef::new(name, ColumnType::Varchar(len))
}

pub fn jobs_table() -> TableDef {
  timestamped(
    TableDef::new(JOBS)
      .column(ColumnDef::id())
      .column(varchar("job_title", 200).not_null())
      .column(varchar("company_name", 200).not_null())
      .column(ColumnDef::new("job_description", ColumnType::Text))
      .column(varchar("work_type", 100))
      .column(ColumnDef::new("required_skills", ColumnType::Text))
      .column(ColumnDef::new("salary_min", ColumnType::Integer))
      .column(ColumnDef::new("salary_max", ColumnType::Integer))
      .column(varchar("salary_type", 20))
      .column(varchar("salary_text", 100))
      .column(varchar("experience_text", 100))
      .column(ColumnDef::new("experience_min", ColumnType::Integer))
      .column(varchar("city", 50))
      .column(varchar("district", 50))
      .column(varchar("location", 200))
      .column(varchar("job_url", 500).not_null().unique())
      .column(varchar("platform", 100)),
  )
}

/// Categories keyed by `(platform, category_id, sub_category_id)`.
pub fn categories_table() -> TableDef {
  timestamped(
    TableDef::new(CATEGORIES)
      .column(ColumnDef::id())
      .column(varchar("platform", 100).not_null())
      .column(varchar("category_id", 200).not_null())
      .column(ColumnDef::new("category_name", ColumnType::Text))
      .column(varchar("sub_category_id", 200).not_null())
      .column(ColumnDef::new("sub_category_name", ColumnType::Text))
      .unique_together(Some("uix_category_key"), &[
        "platform",
        "category_id",
        "sub_category_id",
      ]),
  )
}

/// The first `categories` revision, unique on `category_id` alone.
///
/// Kept only to recognise databases created before the composite key.
/// Reconciling such a database against [`categories_table`] adds the
/// composite-key columns but leaves the old `UNIQUE (category_id)` in place,
/// so two sub-categories under one `category_id` still collide there until
/// the constraint is dropped by hand.
#[deprecated(note = "categories are keyed by (platform, category_id, sub_category_id)")]
pub fn legacy_categories_table() -> TableDef {
  timestamped(
    TableDef::new(CATEGORIES)
      .column(ColumnDef::id())
      .column(varchar("category_id", 200).not_null())
      .column(ColumnDef::new("category_name", ColumnType::Text))
      .unique_together(None, &["category_id"]),
  )
}

pub fn skills_table() -> TableDef {
  timestamped(
    TableDef::new(SKILLS)
      .column(ColumnDef::id())
      .column(varchar("name", 200).not_null().unique()),
  )
}

/// An association table between `jobs` and `target`, unique on the pair.
fn edge_table(name: &str, column: &str, target: &str, constraint: &str) -> TableDef {
  timestamped(
    TableDef::new(name)
      .column(ColumnDef::id())
      .column(ColumnDef::new("job_id", ColumnType::BigInteger).not_null())
      .column(ColumnDef::new(column, ColumnType::BigInteger).not_null())
      .references("job_id", JOBS, "id")
      .references(column, target, "id")
      .unique_together(Some(constraint), &["job_id", column]),
  )
}

pub fn jobs_categories_table() -> TableDef {
  edge_table(JOBS_CATEGORIES, "category_id", CATEGORIES, "uix_job_category")
}

pub fn jobs_skills_table() -> TableDef {
  edge_table(JOBS_SKILLS, "skill_id", SKILLS, "uix_job_skill")
}

/// The full schema in creation order.
pub fn job_market_schema() -> Result<Schema> {
  Schema::new(vec![
    jobs_table(),
    categories_table(),
    skills_table(),
    jobs_categories_table(),
    jobs_skills_table(),
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn schema_is_valid() {
    let schema = job_market_schema().unwrap();
    let names: Vec<_> = schema.tables().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, [JOBS, CATEGORIES, SKILLS, JOBS_CATEGORIES, JOBS_SKILLS]);
  }

  #[test]
  fn job_url_is_unique() {
    let jobs = jobs_table();
    let url = jobs.get_column("job_url").unwrap();
    assert!(url.unique);
    assert!(!url.nullable);
  }

  #[test]
  fn edges_cascade_and_are_unique_per_pair() {
    let edges = jobs_skills_table();
    assert!(edges.foreign_keys.iter().all(|fk| fk.on_delete_cascade));
    assert!(edges.declares_unique(&["job_id".into(), "skill_id".into()]));
  }

  #[test]
  #[allow(deprecated)]
  fn legacy_categories_differ_from_canonical() {
    let legacy = legacy_categories_table();
    assert!(legacy.declares_unique(&["category_id".into()]));
    assert!(legacy.get_column("platform").is_none());
    assert!(!categories_table().declares_unique(&["category_id".into()]));
  }
}
