use garde::Validate;
use movies_dal::movie::{Movie, MovieFilter};
use movies_types::claim::Policy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::token::RequiredRolesLayer, state::AppState};
use axum::routing::{delete, get, post, put};

/// Genre label must not contain comma
fn no_separator(genre: &str, _ctx: &()) -> garde::Result {
    if genre.contains(',') {
        Err(garde::Error::new("genre must not contain comma"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateMovie {
    #[garde(length(min = 1, max = 255))]
    pub title: String,
    #[garde(range(min = 1888, max = 2100))]
    pub year_of_release: i32,
    #[serde(default)]
    #[garde(length(max = 100), inner(length(min = 1, max = 64), custom(no_separator)))]
    pub genres: Vec<String>,
}

/// Update replaces all fields, genres included
pub type UpdateMovie = CreateMovie;

impl CreateMovie {
    fn into_movie(self, id: Uuid) -> Movie {
        Movie::new(id, self.title, self.year_of_release, self.genres)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct MovieFilterQuery {
    /// Part of title, case insensitive
    #[garde(length(min = 1, max = 255))]
    title: Option<String>,
    #[garde(range(min = 1888, max = 2100))]
    year: Option<i32>,
}

impl From<MovieFilterQuery> for MovieFilter {
    fn from(query: MovieFilterQuery) -> Self {
        MovieFilter {
            title: query.title,
            year_of_release: query.year,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MovieResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub year_of_release: i32,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
    pub user_rating: Option<i32>,
}

impl From<Movie> for MovieResponse {
    fn from(movie: Movie) -> Self {
        MovieResponse {
            slug: movie.slug(),
            id: movie.id,
            title: movie.title,
            year_of_release: movie.year_of_release,
            genres: movie.genres,
            rating: movie.rating,
            user_rating: movie.user_rating,
        }
    }
}

mod crud_api {
    use axum::{
        extract::{Path, Query, State},
        response::IntoResponse,
        Json,
    };
    use axum_valid::Garde;
    use http::StatusCode;
    use movies_dal::{movie::MovieRepository, Caller};
    use tracing::debug;
    use uuid::Uuid;

    use super::{CreateMovie, MovieFilterQuery, MovieResponse, UpdateMovie};
    use crate::{
        error::{ApiError, ApiResult},
        rest_api::{Page, Paging},
        state::AppState,
    };

    async fn fetch(
        repository: &MovieRepository,
        id: Uuid,
        caller: &Caller,
    ) -> ApiResult<MovieResponse> {
        repository
            .get_by_id(id, caller)
            .await?
            .map(MovieResponse::from)
            .ok_or_else(|| ApiError::ResourceNotFound(format!("Movie {id}")))
    }

    #[cfg_attr(feature = "openapi", utoipa::path(post, path = "", tag = "Movie", operation_id = "createMovie",
        request_body = CreateMovie,
        responses((status = StatusCode::CREATED, description = "Created Movie", body = MovieResponse))))]
    pub async fn create(
        repository: MovieRepository,
        caller: Caller,
        Garde(Json(payload)): Garde<Json<CreateMovie>>,
    ) -> ApiResult<impl IntoResponse> {
        let movie = payload.into_movie(Uuid::new_v4());
        repository.create(&movie).await?;
        debug!("Created movie {} as {}", movie.id, movie.slug());
        let record = fetch(&repository, movie.id, &caller).await?;

        Ok((StatusCode::CREATED, Json(record)))
    }

    #[cfg_attr(feature = "openapi", utoipa::path(get, path = "/{id}", tag = "Movie", operation_id = "getMovie",
        params(("id" = String, Path, description = "Movie id or slug")),
        responses((status = StatusCode::OK, description = "Get one", body = MovieResponse))))]
    pub async fn get(
        Path(id_or_slug): Path<String>,
        repository: MovieRepository,
        caller: Caller,
    ) -> ApiResult<impl IntoResponse> {
        let record = match Uuid::parse_str(&id_or_slug) {
            Ok(id) => repository.get_by_id(id, &caller).await?,
            Err(_) => repository.get_by_slug(&id_or_slug, &caller).await?,
        }
        .ok_or_else(|| ApiError::ResourceNotFound(format!("Movie {id_or_slug}")))?;

        Ok((StatusCode::OK, Json(MovieResponse::from(record))))
    }

    #[cfg_attr(feature = "openapi", utoipa::path(get, path = "", tag = "Movie", operation_id = "listMovie",
        params(Paging, MovieFilterQuery),
        responses((status = StatusCode::OK, description = "List paginated", body = Page<MovieResponse>))))]
    pub async fn list(
        repository: MovieRepository,
        caller: Caller,
        State(state): State<AppState>,
        Garde(Query(paging)): Garde<Query<Paging>>,
        Garde(Query(filter)): Garde<Query<MovieFilterQuery>>,
    ) -> ApiResult<impl IntoResponse> {
        let default_page_size: u32 = state.config().default_page_size;
        let page_size = paging.page_size(default_page_size);
        let listing_params = paging.into_listing_params(default_page_size)?;
        let batch = repository
            .list(&caller, &filter.into(), listing_params)
            .await?;
        let page = Page::from_batch(batch, page_size)?.map(MovieResponse::from);
        Ok((StatusCode::OK, Json(page)))
    }

    #[cfg_attr(feature = "openapi", utoipa::path(put, path = "/{id}", tag = "Movie", operation_id = "updateMovie",
        request_body = UpdateMovie,
        responses((status = StatusCode::OK, description = "Updated Movie", body = MovieResponse))))]
    pub async fn update(
        Path(id): Path<Uuid>,
        repository: MovieRepository,
        caller: Caller,
        Garde(Json(payload)): Garde<Json<UpdateMovie>>,
    ) -> ApiResult<impl IntoResponse> {
        let movie = payload.into_movie(id);
        repository.update(&movie).await?;
        let record = fetch(&repository, id, &caller).await?;

        Ok((StatusCode::OK, Json(record)))
    }

    #[cfg_attr(feature = "openapi", utoipa::path(delete, path = "/{id}", tag = "Movie", operation_id = "deleteMovie",
        responses((status = StatusCode::NO_CONTENT, description = "Deleted Movie"))))]
    pub async fn delete(
        Path(id): Path<Uuid>,
        repository: MovieRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository.delete_by_id(id).await?;

        Ok((StatusCode::NO_CONTENT, ()))
    }
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(
    crud_api::create,
    crud_api::get,
    crud_api::list,
    crud_api::update,
    crud_api::delete,
    super::rating::rate,
    super::rating::delete_rating
))]
struct ApiDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ApiDocs::openapi()
}

/// Movie routes, must be nested inside token layer
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/{id}", delete(crud_api::delete))
        .layer(RequiredRolesLayer::for_policy(Policy::Admin))
        .route("/", post(crud_api::create))
        .route("/{id}", put(crud_api::update))
        .layer(RequiredRolesLayer::for_policy(Policy::TrustedMember))
        .route("/", get(crud_api::list))
        .route("/{id}", get(crud_api::get))
        .route(
            "/{id}/ratings",
            put(super::rating::rate).delete(super::rating::delete_rating),
        )
}
