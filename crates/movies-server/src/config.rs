use std::time::Duration;

use crate::error::Result;
pub use clap::Parser;
use movies_app::state::AppConfig;
use movies_dal::PoolSettings;
use movies_types::config::BackendConfig;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "MOVIES_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "MOVIES_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[command(flatten)]
    pub backend: BackendConfig,

    #[arg(
        long,
        env = "MOVIES_TOKEN_VALIDITY",
        default_value = "1 day",
        help = "Default token validity in human friendly format (e.g. 1d, 1h, 1m, 1s - or combined)",
        value_parser = humantime::parse_duration
    )]
    pub token_validity: Duration,

    #[arg(
        long,
        env = "MOVIES_DEFAULT_PAGE_SIZE",
        default_value = "100",
        help = "Default page size"
    )]
    pub default_page_size: u32,

    #[arg(long, env = "MOVIES_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.backend.db_max_connections,
            acquire_timeout: self.backend.db_acquire_timeout,
        }
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            default_page_size: config.default_page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config() {
        let config = ServerConfig::try_parse_from([
            "movies-server",
            "--port",
            "4000",
            "--data-dir",
            "/tmp/movies-server-test",
            "--token-validity",
            "2h",
            "--db-max-connections",
            "5",
        ])
        .unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.token_validity, Duration::from_secs(7200));
        assert_eq!(
            config.backend.database_url(),
            "sqlite:///tmp/movies-server-test/movies.db"
        );
        assert_eq!(config.pool_settings().max_connections, 5);
        assert_eq!(AppConfig::from(&config).default_page_size, 100);
    }
}
