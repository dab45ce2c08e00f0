//! `jobmarket`: maintain and load the job market database.
//!
//! Reads `config.toml` (or the path given with `--config`) and `JOBMARKET_*`
//! environment variables, opens the SQLite store, and runs one command.
//!
//! ```
//! jobmarket reconcile
//! jobmarket ingest scraped.json
//! jobmarket show https://www.cakeresume.com/jobs/backend-engineer
//! ```

mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use jobmarket_core::{
  job::{NewCategory, NewJob},
  model::job_market_schema,
  store::JobStore,
};
use jobmarket_store_sqlite::SqliteStore;
use serde::Deserialize;
use settings::Settings;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Job market database tool")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Bring the database schema up to date.
  Reconcile,
  /// Load scraped postings from a JSON file.
  Ingest {
    /// A JSON array of `{ "job": {...}, "skills": [...], "categories": [...] }`.
    file: PathBuf,
  },
  /// Print a stored job with its skills and categories.
  Show { job_url: String },
}

/// One posting as handed over by the scraper.
#[derive(Deserialize)]
struct IngestPayload {
  job:        NewJob,
  #[serde(default)]
  skills:     Vec<String>,
  #[serde(default)]
  categories: Vec<NewCategory>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config).context("failed to load configuration")?;

  let store = SqliteStore::open(&settings.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.database_path))?;
  store
    .set_busy_timeout(settings.busy_timeout())
    .await
    .context("failed to set busy timeout")?;

  match cli.command {
    Command::Reconcile => reconcile(&store).await,
    Command::Ingest { file } => ingest(&store, &file).await,
    Command::Show { job_url } => show(&store, &job_url).await,
  }
}

async fn reconcile(store: &SqliteStore) -> anyhow::Result<()> {
  let schema = job_market_schema().context("invalid job market schema")?;
  let report = store.reconcile(&schema).await.context("reconciliation failed")?;

  for table in &report.tables {
    if table.created {
      println!("{}: created", table.table);
    }
    for op in &table.applied {
      println!("{}: {op}", table.table);
    }
    if let Some(conflict) = &table.conflict {
      println!("{}: CONFLICT {conflict}", table.table);
    }
  }
  if report.is_noop() {
    println!("schema is up to date");
  }

  let conflicts = report.conflicts().count();
  if conflicts > 0 {
    bail!("{conflicts} table(s) could not be reconciled");
  }
  Ok(())
}

async fn ingest(store: &SqliteStore, file: &Path) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(file)
    .with_context(|| format!("reading payload file {}", file.display()))?;
  let payloads: Vec<IngestPayload> =
    serde_json::from_str(&raw).context("parsing payload file")?;

  let schema = job_market_schema().context("invalid job market schema")?;
  let report = store.reconcile(&schema).await.context("reconciliation failed")?;
  for conflict in report.conflicts() {
    warn!("Ingesting despite schema conflict: {conflict}");
  }

  let (mut ingested, mut duplicates, mut failed) = (0usize, 0usize, 0usize);
  for IngestPayload { job, skills, categories } in payloads {
    let job_url = job.job_url.clone();
    match store.ingest(job, skills, categories).await {
      Ok(_) => ingested += 1,
      Err(e) if e.is_duplicate() => {
        info!("Skipping {job_url}: already ingested");
        duplicates += 1;
      }
      Err(e) => {
        warn!("Failed to ingest {job_url}: {e}");
        failed += 1;
      }
    }
  }

  let counts = store.entity_counts().await.context("counting rows")?;
  println!("ingested {ingested}, skipped {duplicates} duplicate(s), {failed} failed");
  println!("{}", serde_json::to_string_pretty(&counts)?);
  Ok(())
}

async fn show(store: &SqliteStore, job_url: &str) -> anyhow::Result<()> {
  let Some(job) = store.find_job_by_url(job_url).await.context("looking up job")? else {
    bail!("no job stored for {job_url}");
  };
  let skills = store.skills_for_job(job.id).await.context("reading skills")?;
  let categories = store.categories_for_job(job.id).await.context("reading categories")?;

  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({
      "job": job,
      "skills": skills,
      "categories": categories,
    }))?
  );
  Ok(())
}
