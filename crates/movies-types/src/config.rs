use clap::Parser;
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Parser)]
pub struct BackendConfig {
    #[arg(
        long,
        env = "MOVIES_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db or similar, default is sqlite://[data-dir]/movies.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "MOVIES_DATA_DIR",
        help = "Data directory (database, token secret), default is system default like ~/.local/share/movies",
        default_value_t = default_data_dir()
    )]
    data_dir: String,

    #[arg(
        long,
        env = "MOVIES_DB_MAX_CONNECTIONS",
        default_value_t = 50,
        help = "Maximum number of pooled database connections"
    )]
    pub db_max_connections: u32,

    #[arg(
        long,
        env = "MOVIES_DB_ACQUIRE_TIMEOUT",
        default_value = "5s",
        help = "How long to wait for a free database connection (e.g. 500ms, 5s)",
        value_parser = humantime::parse_duration
    )]
    pub db_acquire_timeout: Duration,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("movies"))
        .unwrap_or_else(|| PathBuf::from("movies"))
        .to_string_lossy()
        .to_string()
}

impl BackendConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/movies.db", self.data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_url() {
        let config =
            BackendConfig::try_parse_from(["movies", "--data-dir", "/tmp/movies-test"]).unwrap();
        assert_eq!(config.database_url(), "sqlite:///tmp/movies-test/movies.db");
        assert_eq!(config.db_max_connections, 50);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_explicit_database_url() {
        let config = BackendConfig::try_parse_from([
            "movies",
            "--database-url",
            "sqlite::memory:",
            "--db-acquire-timeout",
            "250ms",
        ])
        .unwrap();
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.db_acquire_timeout, Duration::from_millis(250));
    }
}
