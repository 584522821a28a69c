use axum::{response::IntoResponse, Json};
use http::StatusCode;
use serde_json::json;
use tracing::error;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] movies_dal::Error),
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use movies_dal::Error as DalError;
        match self {
            ApiError::DatabaseError(e) => match e {
                DalError::RecordNotFound(_) => StatusCode::NOT_FOUND,
                DalError::Conflict(_) => StatusCode::CONFLICT,
                DalError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                DalError::InvalidOrderByField(_) => StatusCode::BAD_REQUEST,
                DalError::DatabaseError(_) | DalError::MigrationError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {self}");
            status
                .canonical_reason()
                .unwrap_or("Internal error")
                .to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(movies_dal::Error::RecordNotFound("Movie".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(movies_dal::Error::Conflict("slug".into())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(movies_dal::Error::Unavailable(
                    movies_dal::SqlxError::PoolTimedOut,
                )),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(movies_dal::Error::InvalidOrderByField("id".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(movies_dal::Error::DatabaseError(
                    movies_dal::SqlxError::RowNotFound,
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::InvalidQuery("page".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
