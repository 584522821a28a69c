use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::{Pool, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::{
    Batch, Caller, ChosenConnection, ChosenDB, ConnectionProvider, ListingParams,
    error::{Error, Result},
    rating::{AGGREGATE_RATING, caller_rating},
};

pub const VALID_ORDER_FIELDS: &[&str] = &["title", "year_of_release", "slug"];

/// Derives URL friendly identifier from title and year of release.
///
/// Keeps only ASCII letters, digits, space, underscore and hyphen, lowercases
/// the rest and turns spaces into hyphens.
pub fn slugify(title: &str, year_of_release: i32) -> String {
    let sanitized: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .map(|c| match c {
            ' ' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    format!("{sanitized}-{year_of_release}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub year_of_release: i32,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
    pub user_rating: Option<i32>,
}

impl Movie {
    pub fn new(
        id: Uuid,
        title: impl Into<String>,
        year_of_release: i32,
        genres: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Movie {
            id,
            title: title.into(),
            year_of_release,
            genres: genres.into_iter().map(Into::into).collect(),
            rating: None,
            user_rating: None,
        }
    }

    /// Always computed from current title and year, so it is never stale
    pub fn slug(&self) -> String {
        slugify(&self.title, self.year_of_release)
    }

    fn distinct_genres(&self) -> BTreeSet<&str> {
        self.genres.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MovieFilter {
    pub title: Option<String>,
    pub year_of_release: Option<i32>,
}

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
    year_of_release: i32,
    #[sqlx(default)]
    genres: Option<String>,
    rating: Option<f32>,
    user_rating: Option<i32>,
}

impl MovieRow {
    fn into_movie(self, genres: Vec<String>) -> Movie {
        Movie {
            id: self.id,
            title: self.title,
            year_of_release: self.year_of_release,
            genres,
            rating: self.rating,
            user_rating: self.user_rating,
        }
    }

    /// For listings genres come as a JSON array in a single column,
    /// movie without genres yields `[null]` from the outer join
    fn into_listed_movie(mut self) -> Result<Movie> {
        let genres = match self.genres.take() {
            Some(json) => serde_json::from_str::<Vec<Option<String>>>(&json)
                .map_err(|e| Error::DatabaseError(sqlx::Error::Decode(Box::new(e))))?
                .into_iter()
                .flatten()
                .collect(),
            None => Vec::new(),
        };
        Ok(self.into_movie(genres))
    }
}

// Caller's user id is always bound as ?1, key as ?2
fn select_movie(key_condition: &str) -> String {
    format!(
        "SELECT m.id, m.title, m.year_of_release, {AGGREGATE_RATING} AS rating, {} AS user_rating \
        FROM movies m WHERE {key_condition}",
        caller_rating(1)
    )
}

fn select_movies(caller_param: u8, filter_and_tail: &str) -> String {
    format!(
        "SELECT m.id, m.title, m.year_of_release, json_group_array(g.name) AS genres, \
        {AGGREGATE_RATING} AS rating, {} AS user_rating \
        FROM movies m LEFT JOIN genres g ON m.id = g.movie_id {filter_and_tail}",
        caller_rating(caller_param)
    )
}

// Title pattern is bound as ?1, year as ?2
const FILTER_CONDITION: &str = "(?1 IS NULL OR m.title LIKE ?1 ESCAPE '\\') \
    AND (?2 IS NULL OR m.year_of_release = ?2)";

/// Substring pattern for LIKE, so `%` and `_` in the title match literally
fn title_pattern(title: &str) -> String {
    let mut pattern = String::with_capacity(title.len() + 2);
    pattern.push('%');
    for c in title.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn load_genres(conn: &mut ChosenConnection, movie_id: Uuid) -> Result<Vec<String>> {
    let genres = sqlx::query_scalar::<_, String>("SELECT name FROM genres WHERE movie_id = ?")
        .bind(movie_id)
        .fetch_all(conn)
        .await?;
    Ok(genres)
}

async fn insert_genres(
    conn: &mut ChosenConnection,
    movie_id: Uuid,
    genres: BTreeSet<&str>,
) -> Result<()> {
    if genres.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::<ChosenDB>::new("INSERT INTO genres (movie_id, name) ");
    builder.push_values(genres, |mut row, name| {
        row.push_bind(movie_id).push_bind(name.to_string());
    });
    builder.build().execute(conn).await?;
    Ok(())
}

pub type MovieRepository = MovieRepositoryImpl<Pool<ChosenDB>>;

pub struct MovieRepositoryImpl<P> {
    provider: P,
}

impl<P> MovieRepositoryImpl<P>
where
    P: ConnectionProvider,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Stores movie with its genres, nothing is stored if any statement fails
    pub async fn create(&self, movie: &Movie) -> Result<()> {
        let slug = movie.slug();
        let mut transaction = self.provider.begin().await?;
        let result = sqlx::query(
            "INSERT INTO movies (id, slug, title, year_of_release) VALUES (?, ?, ?, ?)",
        )
        .bind(movie.id)
        .bind(&slug)
        .bind(&movie.title)
        .bind(movie.year_of_release)
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!("Movie {slug} was not inserted")));
        }

        insert_genres(&mut *transaction, movie.id, movie.distinct_genres()).await?;
        transaction.commit().await?;
        debug!("Created movie {} ({slug})", movie.id);
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid, caller: &Caller) -> Result<Option<Movie>> {
        let mut conn = self.provider.acquire().await?;
        let row = sqlx::query_as::<_, MovieRow>(&select_movie("m.id = ?2"))
            .bind(caller.user_id())
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let genres = load_genres(&mut *conn, row.id).await?;
                Ok(Some(row.into_movie(genres)))
            }
            None => Ok(None),
        }
    }

    pub async fn get_by_slug(&self, slug: &str, caller: &Caller) -> Result<Option<Movie>> {
        let mut conn = self.provider.acquire().await?;
        let row = sqlx::query_as::<_, MovieRow>(&select_movie("m.slug = ?2"))
            .bind(caller.user_id())
            .bind(slug)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let genres = load_genres(&mut *conn, row.id).await?;
                Ok(Some(row.into_movie(genres)))
            }
            None => Ok(None),
        }
    }

    /// All movies in no particular order
    pub async fn get_all(&self, caller: &Caller) -> Result<Vec<Movie>> {
        let mut conn = self.provider.acquire().await?;
        let rows = sqlx::query_as::<_, MovieRow>(&select_movies(1, "GROUP BY m.id"))
            .bind(caller.user_id())
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(MovieRow::into_listed_movie).collect()
    }

    pub async fn list(
        &self,
        caller: &Caller,
        filter: &MovieFilter,
        params: ListingParams,
    ) -> Result<Batch<Movie>> {
        let ordering = params.ordering(VALID_ORDER_FIELDS)?;
        let order_clause = if ordering.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {ordering}")
        };
        let tail = format!(
            "WHERE {FILTER_CONDITION} GROUP BY m.id {order_clause} LIMIT ?4 OFFSET ?5"
        );
        let sql = select_movies(3, &tail);
        let total = self.count(filter).await?;

        let mut conn = self.provider.acquire().await?;
        let rows = sqlx::query_as::<_, MovieRow>(&sql)
            .bind(filter.title.as_deref().map(title_pattern))
            .bind(filter.year_of_release)
            .bind(caller.user_id())
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&mut *conn)
            .await?;

        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            rows: rows
                .into_iter()
                .map(MovieRow::into_listed_movie)
                .collect::<Result<_>>()?,
            total,
        })
    }

    pub async fn count(&self, filter: &MovieFilter) -> Result<u64> {
        let mut conn = self.provider.acquire().await?;
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT count(*) FROM movies m WHERE {FILTER_CONDITION}"))
                .bind(filter.title.as_deref().map(title_pattern))
                .bind(filter.year_of_release)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count as u64)
    }

    /// Updates title and year (and thus slug) and replaces the whole genre set
    pub async fn update(&self, movie: &Movie) -> Result<()> {
        let slug = movie.slug();
        let mut transaction = self.provider.begin().await?;
        let result = sqlx::query(
            "UPDATE movies SET slug = ?, title = ?, year_of_release = ? WHERE id = ?",
        )
        .bind(&slug)
        .bind(&movie.title)
        .bind(movie.year_of_release)
        .bind(movie.id)
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Movie".to_string()));
        }

        sqlx::query("DELETE FROM genres WHERE movie_id = ?")
            .bind(movie.id)
            .execute(&mut *transaction)
            .await?;
        insert_genres(&mut *transaction, movie.id, movie.distinct_genres()).await?;

        transaction.commit().await?;
        debug!("Updated movie {} ({slug})", movie.id);
        Ok(())
    }

    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let mut transaction = self.provider.begin().await?;
        sqlx::query("DELETE FROM genres WHERE movie_id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await?;

        if result.rows_affected() == 0 {
            Err(Error::RecordNotFound("Movie".to_string()))
        } else {
            transaction.commit().await?;
            debug!("Deleted movie {id}");
            Ok(())
        }
    }

    pub async fn exists_by_id(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.provider.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT count(1) FROM movies WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slugify("The Matrix", 1999), "the-matrix-1999");
        assert_eq!(slugify("Mad Max: Fury Road", 2015), "mad-max-fury-road-2015");
        assert_eq!(slugify("Léon", 1994), "lon-1994");
        assert_eq!(slugify("snake_case-Title", 2000), "snake_case-title-2000");
    }

    #[test]
    fn test_slug_follows_changes() {
        let mut movie = Movie::new(Uuid::new_v4(), "Nick the Greek", 2023, ["Drama"]);
        assert_eq!(movie.slug(), "nick-the-greek-2023");
        movie.title = "Nick the Greek 2".to_string();
        movie.year_of_release = 2025;
        assert_eq!(movie.slug(), "nick-the-greek-2-2025");
    }

    #[test]
    fn test_distinct_genres() {
        let movie = Movie::new(Uuid::new_v4(), "X", 2000, ["Drama", "Action", "Drama"]);
        let genres: Vec<_> = movie.distinct_genres().into_iter().collect();
        assert_eq!(genres, vec!["Action", "Drama"]);
    }

    #[test]
    fn test_title_pattern() {
        assert_eq!(title_pattern("Matrix"), "%Matrix%");
        assert_eq!(title_pattern("100%"), "%100\\%%");
        assert_eq!(title_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[derive(Debug, Clone)]
    struct PlainTitle(String);

    impl Arbitrary for PlainTitle {
        fn arbitrary(g: &mut Gen) -> Self {
            const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ";
            let len = usize::arbitrary(g) % 40 + 1;
            let title = (0..len)
                .map(|_| *g.choose(CHARS).unwrap_or(&b'a') as char)
                .collect();
            PlainTitle(title)
        }
    }

    #[quickcheck]
    fn test_plain_title_slug(title: PlainTitle, year: u16) -> bool {
        let year = year as i32;
        let expected = format!("{}-{}", title.0.to_lowercase().replace(' ', "-"), year);
        slugify(&title.0, year) == expected
    }

    #[quickcheck]
    fn test_slug_is_url_safe(title: String, year: u16) -> bool {
        slugify(&title, year as i32)
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    }
}
