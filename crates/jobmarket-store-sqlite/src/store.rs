//! [`SqliteStore`], the SQLite implementation of [`JobStore`].

use std::{path::Path, time::Duration};

use jobmarket_core::{
  job::{Category, CategoryId, Job, JobId, NewCategory, NewJob, Skill, SkillId},
  report::ReconcileReport,
  schema::Schema,
  store::{EntityCounts, JobStore},
};

use crate::{
  Error, Result,
  encode::RawJob,
  ingest, queries, reconcile,
  resolve::{self, Resolvable},
};

/// Applied to every connection the store opens.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A job market store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`. The schema is not touched; call
  /// [`JobStore::reconcile`] before ingesting.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(|e| Error::Connectivity(format!("{}: {e}", path.display())))?;
    let store = Self { conn };
    store.init(true).await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(|e| Error::Connectivity(e.to_string()))?;
    let store = Self { conn };
    store.init(false).await?;
    Ok(store)
  }

  async fn init(&self, wal: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        if wal {
          let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// How long a write waits for a competing writer's lock before failing.
  pub async fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run raw SQL on the store's connection.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
    let sql = sql.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read live catalog state from the store's connection.
  #[cfg(test)]
  pub(crate) async fn inspect<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Resolve one entity in a transaction of its own.
  async fn resolve_standalone<R>(&self, item: R) -> Result<i64>
  where
    R: Resolvable + Send + 'static,
  {
    self
      .conn
      .call(move |conn| Ok(resolve::resolve_committed(conn, &item)))
      .await?
  }
}

// ─── JobStore impl ───────────────────────────────────────────────────────────

impl JobStore for SqliteStore {
  type Error = Error;

  // ── Schema ────────────────────────────────────────────────────────────────

  async fn reconcile<'a>(&'a self, schema: &'a Schema) -> Result<ReconcileReport> {
    let schema = schema.clone();
    self
      .conn
      .call(move |conn| Ok(reconcile::reconcile(conn, &schema)))
      .await?
  }

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn ingest(
    &self,
    job: NewJob,
    skills: Vec<String>,
    categories: Vec<NewCategory>,
  ) -> Result<JobId> {
    self
      .conn
      .call(move |conn| Ok(ingest::ingest(conn, &job, &skills, &categories)))
      .await?
  }

  async fn resolve_skill(&self, name: String) -> Result<SkillId> {
    self.resolve_standalone(name).await
  }

  async fn resolve_category(&self, category: NewCategory) -> Result<CategoryId> {
    self.resolve_standalone(category).await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
    let raw = self
      .conn
      .call(move |conn| Ok(queries::get_job(conn, id)))
      .await??;
    raw.map(RawJob::into_job).transpose()
  }

  async fn find_job_by_url<'a>(&'a self, job_url: &'a str) -> Result<Option<Job>> {
    let job_url = job_url.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(queries::find_job_by_url(conn, &job_url)))
      .await??;
    raw.map(RawJob::into_job).transpose()
  }

  async fn skills_for_job(&self, id: JobId) -> Result<Vec<Skill>> {
    self
      .conn
      .call(move |conn| Ok(queries::skills_for_job(conn, id)))
      .await?
  }

  async fn categories_for_job(&self, id: JobId) -> Result<Vec<Category>> {
    self
      .conn
      .call(move |conn| Ok(queries::categories_for_job(conn, id)))
      .await?
  }

  async fn entity_counts(&self) -> Result<EntityCounts> {
    self
      .conn
      .call(move |conn| Ok(queries::entity_counts(conn)))
      .await?
  }
}
