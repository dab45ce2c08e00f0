//! The job ingestion transaction.

use jobmarket_core::{
  job::{JobId, NewCategory, NewJob},
  model,
};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use tracing::{info, warn};

use crate::{
  Error, Result,
  error::unique_violation,
  resolve::{Resolvable, resolve},
};

/// Insert `job` and link it to `skills` and `categories`, creating skills and
/// categories that do not exist yet. Everything commits together or not at
/// all.
///
/// Links are made in caller order. Repeated skill names or categories in the
/// input collapse onto one edge.
pub fn ingest(
  conn: &mut Connection,
  job: &NewJob,
  skills: &[String],
  categories: &[NewCategory],
) -> Result<JobId> {
  // Rolls back on drop unless committed.
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let job_id = insert_job(&tx, job)?;
  for name in skills {
    link(&tx, &Edge::SKILL, job_id, name)?;
  }
  for category in categories {
    link(&tx, &Edge::CATEGORY, job_id, category)?;
  }

  tx.commit()?;
  info!(
    "Ingested job {job_id} ({}) with {} skill(s) and {} category link(s)",
    job.job_url,
    skills.len(),
    categories.len(),
  );
  Ok(job_id)
}

fn insert_job(tx: &Transaction<'_>, job: &NewJob) -> Result<JobId> {
  let inserted = tx.execute(
    "INSERT INTO jobs (
       job_title, company_name, job_description, work_type, required_skills,
       salary_min, salary_max, salary_type, salary_text, experience_text,
       experience_min, city, district, location, job_url, platform
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    params![
      job.job_title,
      job.company_name,
      job.job_description,
      job.work_type,
      job.required_skills,
      job.salary_min,
      job.salary_max,
      job.salary_type,
      job.salary_text,
      job.experience_text,
      job.experience_min,
      job.city,
      job.district,
      job.location,
      job.job_url,
      job.platform,
    ],
  );

  match inserted {
    Ok(_) => Ok(tx.last_insert_rowid()),
    Err(e) if unique_violation(&e).is_some_and(|msg| msg.contains("jobs.job_url")) => {
      Err(Error::DuplicateJob { job_url: job.job_url.clone() })
    }
    Err(e) => Err(Error::from_write(e)),
  }
}

/// An association table from `jobs` to one resolvable entity.
struct Edge {
  table:  &'static str,
  column: &'static str,
}

impl Edge {
  const CATEGORY: Self = Self { table: model::JOBS_CATEGORIES, column: "category_id" };
  const SKILL: Self = Self { table: model::JOBS_SKILLS, column: "skill_id" };
}

/// Resolve `target` and link it to `job_id`. An edge that already exists is
/// left alone.
fn link<R: Resolvable>(tx: &Transaction<'_>, edge: &Edge, job_id: JobId, target: &R) -> Result<()> {
  let target_id = resolve(tx, target)?;
  let sql = format!(
    "INSERT INTO {} (job_id, {}) VALUES (?1, ?2)",
    edge.table, edge.column
  );
  match tx.execute(&sql, params![job_id, target_id]) {
    Ok(_) => Ok(()),
    Err(e) if unique_violation(&e).is_some() => {
      warn!(
        "Job {job_id} is already linked to {} {target_id} ({}); skipping",
        R::TABLE,
        target.describe(),
      );
      Ok(())
    }
    Err(e) => Err(Error::from_write(e)),
  }
}
