//! Read queries over ingested jobs.

use jobmarket_core::{
  job::{Category, JobId, NewCategory, Skill},
  model,
  store::EntityCounts,
};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::{
  Result,
  encode::{JOB_COLUMNS, RawJob},
};

pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<RawJob>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
        params![id],
        RawJob::from_row,
      )
      .optional()?,
  )
}

pub fn find_job_by_url(conn: &Connection, job_url: &str) -> Result<Option<RawJob>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_url = ?1"),
        params![job_url],
        RawJob::from_row,
      )
      .optional()?,
  )
}

/// Skills linked to `id`, oldest link first.
pub fn skills_for_job(conn: &Connection, id: JobId) -> Result<Vec<Skill>> {
  let mut stmt = conn.prepare(
    "SELECT s.id, s.name
     FROM jobs_skills e
     JOIN skills s ON s.id = e.skill_id
     WHERE e.job_id = ?1
     ORDER BY e.id",
  )?;
  let skills = stmt
    .query_map(params![id], |row| Ok(Skill { id: row.get(0)?, name: row.get(1)? }))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(skills)
}

/// Categories linked to `id`, oldest link first.
pub fn categories_for_job(conn: &Connection, id: JobId) -> Result<Vec<Category>> {
  let mut stmt = conn.prepare(
    "SELECT c.id, c.platform, c.category_id, c.category_name,
            c.sub_category_id, c.sub_category_name
     FROM jobs_categories e
     JOIN categories c ON c.id = e.category_id
     WHERE e.job_id = ?1
     ORDER BY e.id",
  )?;
  let categories = stmt
    .query_map(params![id], |row| {
      Ok(Category {
        id:         row.get(0)?,
        attributes: NewCategory {
          platform:          row.get(1)?,
          category_id:       row.get(2)?,
          category_name:     row.get(3)?,
          sub_category_id:   row.get(4)?,
          sub_category_name: row.get(5)?,
        },
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(categories)
}

pub fn entity_counts(conn: &Connection) -> Result<EntityCounts> {
  let count = |table: &str| -> Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n.unsigned_abs())
  };
  Ok(EntityCounts {
    jobs:            count(model::JOBS)?,
    skills:          count(model::SKILLS)?,
    categories:      count(model::CATEGORIES)?,
    jobs_skills:     count(model::JOBS_SKILLS)?,
    jobs_categories: count(model::JOBS_CATEGORIES)?,
  })
}
