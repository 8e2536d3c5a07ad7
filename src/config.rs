use std::path::PathBuf;

/// Environment variable overriding the database location.
pub const DB_ENV: &str = "CREWTASK_DB";
/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "CREWTASK_LOG";

const DEFAULT_LOG_FILTER: &str = "crewtask=warn";

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where the entity snapshot is stored.
    pub db_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Config {
    /// Builds the configuration from `CREWTASK_DB` and `CREWTASK_LOG`.
    ///
    /// The database path is determined in the following order:
    /// 1. `CREWTASK_DB` environment variable.
    /// 2. `~/.local/share/crewtask/entities.json` (on Linux).
    /// 3. `./entities.json` (fallback).
    pub fn from_env() -> Self {
        let db_path = std::env::var(DB_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());
        let log_filter =
            std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        Config { db_path, log_filter }
    }
}

fn default_db_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(mut p) => {
            p.push("crewtask");
            p.push("entities.json");
            p
        }
        None => PathBuf::from("entities.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_ends_with_entities_file() {
        assert!(default_db_path().ends_with("entities.json"));
    }
}
