//! Job postings and the entities they link to.
//!
//! `New*` types are what the scraping pipeline hands to the store; the plain
//! types are what the store reads back, carrying surrogate ids and
//! timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type JobId = i64;
pub type SkillId = i64;
pub type CategoryId = i64;

// ─── Jobs ────────────────────────────────────────────────────────────────────

/// The attributes of a scraped posting. `job_url` is the natural key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewJob {
  pub job_title:       String,
  pub company_name:    String,
  pub job_description: Option<String>,
  pub work_type:       Option<String>,
  /// Free-text skills line as shown on the posting.
  pub required_skills: Option<String>,
  pub salary_min:      Option<i64>,
  pub salary_max:      Option<i64>,
  /// Pay period or currency tag, e.g. "monthly".
  pub salary_type:     Option<String>,
  pub salary_text:     Option<String>,
  pub experience_text: Option<String>,
  pub experience_min:  Option<i64>,
  pub city:            Option<String>,
  pub district:        Option<String>,
  pub location:        Option<String>,
  pub job_url:         String,
  pub platform:        Option<String>,
}

impl NewJob {
  /// A posting with only the required attributes set.
  pub fn new(
    job_title: impl Into<String>,
    company_name: impl Into<String>,
    job_url: impl Into<String>,
  ) -> Self {
    Self {
      job_title: job_title.into(),
      company_name: company_name.into(),
      job_url: job_url.into(),
      ..Self::default()
    }
  }
}

/// A persisted job row.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
  pub id:         JobId,
  #[serde(flatten)]
  pub attributes: NewJob,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

// ─── Skills ──────────────────────────────────────────────────────────────────

/// A skill, unique by its case-sensitive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skill {
  pub id:   SkillId,
  pub name: String,
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// A platform category. `(platform, category_id, sub_category_id)` is the
/// natural key; the names are display attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
  pub platform:          String,
  pub category_id:       String,
  #[serde(default)]
  pub category_name:     Option<String>,
  pub sub_category_id:   String,
  #[serde(default)]
  pub sub_category_name: Option<String>,
}

impl NewCategory {
  pub fn new(
    platform: impl Into<String>,
    category_id: impl Into<String>,
    sub_category_id: impl Into<String>,
  ) -> Self {
    Self {
      platform:          platform.into(),
      category_id:       category_id.into(),
      category_name:     None,
      sub_category_id:   sub_category_id.into(),
      sub_category_name: None,
    }
  }
}

/// A persisted category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
  pub id:         CategoryId,
  #[serde(flatten)]
  pub attributes: NewCategory,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_job_deserialises_with_missing_optionals() {
    let job: NewJob = serde_json::from_value(serde_json::json!({
      "job_title": "Backend Engineer",
      "company_name": "Example Ltd",
      "job_url": "https://jobs.example.com/1",
      "salary_min": 50000,
    }))
    .unwrap();

    assert_eq!(job.job_title, "Backend Engineer");
    assert_eq!(job.salary_min, Some(50000));
    assert_eq!(job.city, None);
  }

  #[test]
  fn category_names_are_optional() {
    let cat: NewCategory = serde_json::from_value(serde_json::json!({
      "platform": "cakeresume",
      "category_id": "tech",
      "sub_category_id": "frontend",
    }))
    .unwrap();
    assert_eq!(cat, NewCategory::new("cakeresume", "tech", "frontend"));
  }
}
