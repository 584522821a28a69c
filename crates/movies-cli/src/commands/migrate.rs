use clap::Parser;
use movies_dal::PoolSettings;
use movies_types::config::BackendConfig;
use tracing::info;

use crate::commands::Executor;

#[derive(Parser, Debug)]
pub struct MigrateCmd {
    #[command(flatten)]
    backend: BackendConfig,
}

impl Executor for MigrateCmd {
    async fn run(self) -> anyhow::Result<()> {
        let data_dir = self.backend.data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let settings = PoolSettings {
            max_connections: 1,
            acquire_timeout: self.backend.db_acquire_timeout,
        };
        let pool = movies_dal::new_pool_with(&self.backend.database_url(), settings).await?;
        movies_dal::migrate(&pool).await?;
        pool.close().await;
        info!("Database {} is up to date", self.backend.database_url());
        Ok(())
    }
}
