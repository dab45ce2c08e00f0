//! Layered configuration: built-in defaults, then the optional TOML file,
//! then `JOBMARKET_*` environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;

const DEFAULT_DATABASE_PATH: &str = "jobmarket.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
  /// SQLite database file. A leading `~/` is expanded.
  pub database_path:   PathBuf,
  /// How long a writer waits on a locked database, in milliseconds.
  pub busy_timeout_ms: u64,
}

impl Settings {
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    let mut settings: Self = config::Config::builder()
      .set_default("database_path", DEFAULT_DATABASE_PATH)?
      .set_default("busy_timeout_ms", DEFAULT_BUSY_TIMEOUT_MS)?
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("JOBMARKET").try_parsing(true))
      .build()?
      .try_deserialize()?;
    settings.database_path = expand_tilde(&settings.database_path);
    Ok(settings)
  }

  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let settings = Settings::load(Path::new("/nonexistent/jobmarket.toml")).unwrap();
    assert_eq!(settings.busy_timeout(), Duration::from_secs(5));
  }

  #[test]
  fn file_values_override_defaults() {
    let file = std::env::temp_dir().join(format!("jobmarket-settings-{}.toml", std::process::id()));
    std::fs::write(&file, "database_path = \"/var/lib/jobs.db\"\nbusy_timeout_ms = 250\n").unwrap();

    let settings = Settings::load(&file).unwrap();
    std::fs::remove_file(&file).unwrap();

    assert_eq!(settings.database_path, PathBuf::from("/var/lib/jobs.db"));
    assert_eq!(settings.busy_timeout_ms, 250);
  }

  #[test]
  fn relative_paths_are_left_alone() {
    assert_eq!(expand_tilde(Path::new("data/jobs.db")), PathBuf::from("data/jobs.db"));
  }
}
