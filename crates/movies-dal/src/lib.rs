pub mod error;
pub mod movie;
pub mod rating;

use std::{fmt::Display, future::Future, str::FromStr as _, time::Duration};

pub use error::Error;
pub use sqlx::Error as SqlxError;
use sqlx::{
    Transaction,
    migrate::Migrator,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type ChosenRow = sqlx::sqlite::SqliteRow;
pub type ChosenConnection = sqlx::SqliteConnection;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Source of scoped database connections.
///
/// Both the connection and the transaction go back to the pool when dropped,
/// a transaction dropped without commit is rolled back. Dropping the returned
/// futures cancels the acquisition.
pub trait ConnectionProvider: Send + Sync {
    fn acquire(&self) -> impl Future<Output = Result<PoolConnection<ChosenDB>>> + Send;
    fn begin(&self) -> impl Future<Output = Result<Transaction<'static, ChosenDB>>> + Send;
}

impl ConnectionProvider for Pool {
    async fn acquire(&self) -> Result<PoolConnection<ChosenDB>> {
        let conn = sqlx::Pool::acquire(self).await?;
        Ok(conn)
    }

    async fn begin(&self) -> Result<Transaction<'static, ChosenDB>> {
        let transaction = sqlx::Pool::begin(self).await?;
        Ok(transaction)
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 50,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

pub async fn new_pool(database_url: &str) -> Result<Pool> {
    new_pool_with(database_url, PoolSettings::default()).await
}

pub async fn new_pool_with(database_url: &str, settings: PoolSettings) -> Result<Pool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await?;
    debug!(
        "Connected to {database_url} with up to {} connections",
        settings.max_connections
    );
    Ok(pool)
}

pub async fn migrate(pool: &Pool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Identity of the requesting user for reads, used to resolve their own rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller {
    user_id: Option<Uuid>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }
}

impl From<Option<Uuid>> for Caller {
    fn from(user_id: Option<Uuid>) -> Self {
        Self { user_id }
    }
}

#[derive(Debug, Clone)]
pub enum Order {
    Asc(String),
    Desc(String),
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc(s) => write!(f, "{}", s),
            Order::Desc(s) => write!(f, "{} DESC", s),
        }
    }
}

impl AsRef<str> for Order {
    fn as_ref(&self) -> &str {
        match self {
            Order::Asc(s) => s.as_str(),
            Order::Desc(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<Vec<Order>>,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_LIMIT as i64,
            order: None,
        }
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            order: None,
        }
    }
    pub fn with_order(mut self, order: Vec<Order>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn ordering(&self, valid_fields: &[&str]) -> Result<String> {
        let ordering = self
            .order
            .as_ref()
            .map(|o| {
                o.iter()
                    .map(|o| {
                        if valid_fields.contains(&o.as_ref()) {
                            Ok(o.to_string())
                        } else {
                            Err(Error::InvalidOrderByField(o.as_ref().to_string()))
                        }
                    })
                    .collect::<Result<Vec<String>>>()
                    .map(|o| o.join(", "))
            })
            .transpose()?
            .unwrap_or_default();
        Ok(ordering)
    }
}

/// One page of listing results together with total number of matching records
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub offset: i64,
    pub limit: i64,
    pub rows: Vec<T>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let params = ListingParams::default().with_order(vec![
            Order::Asc("title".to_string()),
            Order::Desc("year_of_release".to_string()),
        ]);
        let ordering = params.ordering(&["title", "year_of_release"]).unwrap();
        assert_eq!(ordering, "title, year_of_release DESC");

        let params = ListingParams::default().with_order(vec![Order::Asc("id; drop".to_string())]);
        let res = params.ordering(&["title"]);
        assert!(matches!(res, Err(Error::InvalidOrderByField(f)) if f == "id; drop"));

        assert_eq!(ListingParams::default().ordering(&["title"]).unwrap(), "");
    }
}
