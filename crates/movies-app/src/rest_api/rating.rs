use axum::{extract::Path, response::IntoResponse, routing::get, Json};
use axum_valid::Garde;
use garde::Validate;
use http::StatusCode;
use movies_dal::rating::RatingRepository;
#[cfg_attr(not(feature = "openapi"), allow(unused_imports))]
use movies_dal::rating::MovieRating;
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth::CurrentUser, error::ApiResult, state::AppState};

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RateMovie {
    #[garde(range(min = 1, max = 5))]
    pub rating: i32,
}

#[cfg_attr(feature = "openapi", utoipa::path(put, path = "/{id}/ratings", tag = "Rating", operation_id = "rateMovie",
    request_body = RateMovie,
    responses((status = StatusCode::NO_CONTENT, description = "Rating stored"))))]
pub async fn rate(
    Path(movie_id): Path<Uuid>,
    CurrentUser(user_id): CurrentUser,
    repository: RatingRepository,
    Garde(Json(payload)): Garde<Json<RateMovie>>,
) -> ApiResult<impl IntoResponse> {
    repository
        .rate_movie(movie_id, user_id, payload.rating)
        .await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

#[cfg_attr(feature = "openapi", utoipa::path(delete, path = "/{id}/ratings", tag = "Rating", operation_id = "deleteRating",
    responses((status = StatusCode::NO_CONTENT, description = "Rating removed"))))]
pub async fn delete_rating(
    Path(movie_id): Path<Uuid>,
    CurrentUser(user_id): CurrentUser,
    repository: RatingRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete_rating(movie_id, user_id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/me", tag = "Rating", operation_id = "myRatings",
    responses((status = StatusCode::OK, description = "Ratings of current user", body = Vec<MovieRating>))))]
pub async fn my_ratings(
    CurrentUser(user_id): CurrentUser,
    repository: RatingRepository,
) -> ApiResult<impl IntoResponse> {
    let ratings = repository.ratings_for_user(user_id).await?;
    Ok((StatusCode::OK, Json(ratings)))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(my_ratings))]
struct ApiDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ApiDocs::openapi()
}

/// Ratings of current user, must be nested inside token layer
pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/me", get(my_ratings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_range() {
        assert!(RateMovie { rating: 1 }.validate().is_ok());
        assert!(RateMovie { rating: 5 }.validate().is_ok());
        assert!(RateMovie { rating: 0 }.validate().is_err());
        assert!(RateMovie { rating: 6 }.validate().is_err());
    }
}
