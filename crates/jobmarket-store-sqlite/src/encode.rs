//! Decoding of stored rows into domain types.
//!
//! Timestamps are written by SQLite's `CURRENT_TIMESTAMP` as
//! `YYYY-MM-DD HH:MM:SS` in UTC. Rows written by other tools may carry RFC
//! 3339 strings instead; both are accepted.

use chrono::{DateTime, NaiveDateTime, Utc};
use jobmarket_core::job::{Job, NewJob};

use crate::{Error, Result};

const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(naive) = NaiveDateTime::parse_from_str(s, SQLITE_TIMESTAMP) {
    return Ok(naive.and_utc());
  }
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// The `jobs` columns [`RawJob::from_row`] reads, in order.
pub const JOB_COLUMNS: &str = "id, job_title, company_name, job_description, work_type,
  required_skills, salary_min, salary_max, salary_type, salary_text,
  experience_text, experience_min, city, district, location, job_url, platform,
  created_at, updated_at";

/// A `jobs` row as read, before timestamp decoding.
pub struct RawJob {
  pub id:         i64,
  pub attributes: NewJob,
  pub created_at: String,
  pub updated_at: String,
}

impl RawJob {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      attributes: NewJob {
        job_title:       row.get(1)?,
        company_name:    row.get(2)?,
        job_description: row.get(3)?,
        work_type:       row.get(4)?,
        required_skills: row.get(5)?,
        salary_min:      row.get(6)?,
        salary_max:      row.get(7)?,
        salary_type:     row.get(8)?,
        salary_text:     row.get(9)?,
        experience_text: row.get(10)?,
        experience_min:  row.get(11)?,
        city:            row.get(12)?,
        district:        row.get(13)?,
        location:        row.get(14)?,
        job_url:         row.get(15)?,
        platform:        row.get(16)?,
      },
      created_at: row.get(17)?,
      updated_at: row.get(18)?,
    })
  }

  pub fn into_job(self) -> Result<Job> {
    Ok(Job {
      id:         self.id,
      attributes: self.attributes,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
