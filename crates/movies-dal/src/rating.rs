use futures::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::debug;
use uuid::Uuid;

use crate::{
    ChosenDB, ConnectionProvider,
    error::{Error, Result},
};

/// Mean of all ratings of movie aliased as `m`, rounded to one decimal
pub(crate) const AGGREGATE_RATING: &str =
    "(SELECT round(avg(r.rating), 1) FROM ratings r WHERE r.movie_id = m.id)";

/// Rating given to movie aliased as `m` by user bound to numbered parameter `param`
pub(crate) fn caller_rating(param: u8) -> String {
    format!(
        "(SELECT r.rating FROM ratings r WHERE r.movie_id = m.id AND r.user_id = ?{param} LIMIT 1)"
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MovieRatings {
    pub rating: Option<f32>,
    pub user_rating: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MovieRating {
    pub movie_id: Uuid,
    pub slug: String,
    pub rating: i32,
}

pub type RatingRepository = RatingRepositoryImpl<Pool<ChosenDB>>;

pub struct RatingRepositoryImpl<P> {
    provider: P,
}

impl<P> RatingRepositoryImpl<P>
where
    P: ConnectionProvider,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub async fn get_aggregate_rating(&self, movie_id: Uuid) -> Result<Option<f32>> {
        let mut conn = self.provider.acquire().await?;
        let rating = sqlx::query_scalar::<_, Option<f32>>(
            "SELECT round(avg(rating), 1) FROM ratings WHERE movie_id = ?",
        )
        .bind(movie_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(rating)
    }

    /// Aggregate rating together with the rating given by user, in one round trip
    pub async fn get_ratings(&self, movie_id: Uuid, user_id: Uuid) -> Result<MovieRatings> {
        let mut conn = self.provider.acquire().await?;
        let ratings = sqlx::query_as::<_, MovieRatings>(
            "SELECT round(avg(rating), 1) AS rating, \
            (SELECT rating FROM ratings WHERE movie_id = ?1 AND user_id = ?2 LIMIT 1) AS user_rating \
            FROM ratings WHERE movie_id = ?1",
        )
        .bind(movie_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(ratings)
    }

    /// Creates or overwrites user's rating of the movie
    pub async fn rate_movie(&self, movie_id: Uuid, user_id: Uuid, rating: i32) -> Result<()> {
        let mut conn = self.provider.acquire().await?;
        sqlx::query(
            "INSERT INTO ratings (movie_id, user_id, rating) VALUES (?, ?, ?) \
            ON CONFLICT (movie_id, user_id) DO UPDATE SET rating = excluded.rating",
        )
        .bind(movie_id)
        .bind(user_id)
        .bind(rating)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            let e = Error::from(e);
            if e.is_foreign_key_violation() {
                Error::RecordNotFound("Movie".to_string())
            } else {
                e
            }
        })?;
        debug!("User {user_id} rated movie {movie_id} with {rating}");
        Ok(())
    }

    pub async fn delete_rating(&self, movie_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut conn = self.provider.acquire().await?;
        let res = sqlx::query("DELETE FROM ratings WHERE movie_id = ? AND user_id = ?")
            .bind(movie_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Rating".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn ratings_for_user(&self, user_id: Uuid) -> Result<Vec<MovieRating>> {
        let mut conn = self.provider.acquire().await?;
        let records = sqlx::query_as::<_, MovieRating>(
            "SELECT r.movie_id, m.slug, r.rating FROM ratings r \
            JOIN movies m ON m.id = r.movie_id WHERE r.user_id = ?",
        )
        .bind(user_id)
        .fetch(&mut *conn)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }
}
