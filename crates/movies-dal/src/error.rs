pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Invalid order by field: {0}")]
    InvalidOrderByField(String),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db_error) if db_error.is_unique_violation() => {
                Error::Conflict(db_error.message().to_string())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Error::Unavailable(e),
            e => Error::DatabaseError(e),
        }
    }
}

impl Error {
    pub(crate) fn is_foreign_key_violation(&self) -> bool {
        match self {
            Error::DatabaseError(sqlx::Error::Database(db_error)) => {
                db_error.is_foreign_key_violation()
            }
            _ => false,
        }
    }
}
