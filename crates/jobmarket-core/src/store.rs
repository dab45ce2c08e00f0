//! The `JobStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `jobmarket-store-sqlite`). The command-line front end depends on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use serde::Serialize;

use crate::{
  job::{Category, CategoryId, Job, JobId, NewCategory, NewJob, Skill, SkillId},
  report::ReconcileReport,
  schema::Schema,
};

/// Row counts of the five job market tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
  pub jobs:            u64,
  pub skills:          u64,
  pub categories:      u64,
  pub jobs_skills:     u64,
  pub jobs_categories: u64,
}

/// Abstraction over a job market store backend.
///
/// Writes are additive: rows are created by ingestion and never deleted.
/// Uniqueness of jobs, skills, categories and edges is enforced by the
/// database, not by in-process locks.
pub trait JobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Schema ────────────────────────────────────────────────────────────

  /// Create missing tables and apply additive column changes until the live
  /// database matches `schema`. Running it twice in a row is a no-op the
  /// second time.
  fn reconcile<'a>(
    &'a self,
    schema: &'a Schema,
  ) -> impl Future<Output = Result<ReconcileReport, Self::Error>> + Send + 'a;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Insert a job and link its skills and categories in one transaction.
  ///
  /// Skills and categories are created on first sight and reused afterwards.
  /// Fails without writing anything if `job.job_url` is already stored.
  fn ingest(
    &self,
    job: NewJob,
    skills: Vec<String>,
    categories: Vec<NewCategory>,
  ) -> impl Future<Output = Result<JobId, Self::Error>> + Send + '_;

  /// Return the id of the skill called `name`, creating it if needed.
  fn resolve_skill(
    &self,
    name: String,
  ) -> impl Future<Output = Result<SkillId, Self::Error>> + Send + '_;

  /// Return the id of the category with this natural key, creating it if
  /// needed.
  fn resolve_category(
    &self,
    category: NewCategory,
  ) -> impl Future<Output = Result<CategoryId, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_job(
    &self,
    id: JobId,
  ) -> impl Future<Output = Result<Option<Job>, Self::Error>> + Send + '_;

  fn find_job_by_url<'a>(
    &'a self,
    job_url: &'a str,
  ) -> impl Future<Output = Result<Option<Job>, Self::Error>> + Send + 'a;

  /// Skills linked to a job, in the order they were linked.
  fn skills_for_job(
    &self,
    id: JobId,
  ) -> impl Future<Output = Result<Vec<Skill>, Self::Error>> + Send + '_;

  /// Categories linked to a job, in the order they were linked.
  fn categories_for_job(
    &self,
    id: JobId,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  fn entity_counts(
    &self,
  ) -> impl Future<Output = Result<EntityCounts, Self::Error>> + Send + '_;
}
