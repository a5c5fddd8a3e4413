//! Book catalog persistence.

use lectern_db::{Database, DbError};
use lectern_http::pagination::Pagination;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::models::{Book, BookDraft, BookFilter};
use crate::utils;

pub const TABLE: &str = "books";
/// Columns of the ISBN uniqueness constraint.
pub const ISBN_UNIQUE: &[&str] = &["isbn"];

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE books (
        id TEXT PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        description TEXT NOT NULL,
        cover_image TEXT NOT NULL DEFAULT '',
        isbn TEXT NOT NULL,
        genre TEXT NOT NULL,
        published_year INTEGER NOT NULL,
        average_rating REAL NOT NULL DEFAULT 0,
        review_count INTEGER NOT NULL DEFAULT 0,
        added_by TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (isbn)
    )",
    "CREATE INDEX idx_books_genre ON books(genre)",
    "CREATE INDEX idx_books_created_at ON books(created_at)",
];

const COLUMNS: &str = "id, title, author, description, cover_image, isbn, genre, \
    published_year, average_rating, review_count, added_by, created_at, updated_at";

/// `?1` is a LIKE pattern or NULL, `?2` a genre name or NULL.
const FILTER: &str = "(?1 IS NULL \
        OR title LIKE ?1 ESCAPE '\\' \
        OR author LIKE ?1 ESCAPE '\\' \
        OR description LIKE ?1 ESCAPE '\\') \
    AND (?2 IS NULL OR genre = ?2)";

/// Typed access to the `books` table.
#[derive(Clone)]
pub struct BookRepository {
    db: Database,
}

impl BookRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a book. A taken ISBN fails with [`DbError::UniqueViolation`]
    /// on [`ISBN_UNIQUE`].
    pub async fn insert(&self, book: &Book) -> Result<Book, DbError> {
        sqlx::query(
            "INSERT INTO books (id, title, author, description, cover_image, isbn, genre,
                published_year, average_rating, review_count, added_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.cover_image)
        .bind(&book.isbn)
        .bind(book.genre.as_str())
        .bind(book.published_year)
        .bind(book.average_rating)
        .bind(count_to_sql(book.review_count))
        .bind(&book.added_by)
        .bind(utils::to_unix_nanos(book.created_at))
        .bind(utils::to_unix_nanos(book.updated_at))
        .execute(self.db.pool())
        .await?;

        Ok(book.clone())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Book>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM books WHERE id = ?");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| book_from_row(&row))
            .transpose()
    }

    /// One page of matching books plus the total number of matches, both
    /// read in one transaction.
    pub async fn find(
        &self,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Book>, usize), DbError> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let genre = filter.genre.map(|g| g.as_str());
        let direction = if filter.descending { "DESC" } else { "ASC" };

        let count_sql = format!("SELECT COUNT(*) FROM books WHERE {FILTER}");
        let page_sql = format!(
            "SELECT {COLUMNS} FROM books WHERE {FILTER} \
             ORDER BY {column} {direction}, rowid {direction} LIMIT ?3 OFFSET ?4",
            column = filter.sort.column(),
        );

        let mut tx = self.db.begin().await?;
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&pattern)
            .bind(genre)
            .fetch_one(&mut *tx)
            .await?;
        let rows = sqlx::query(&page_sql)
            .bind(&pattern)
            .bind(genre)
            .bind(count_to_sql(pagination.limit))
            .bind(count_to_sql(pagination.skip()))
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let books = rows.iter().map(book_from_row).collect::<Result<_, _>>()?;
        Ok((books, usize::try_from(total).unwrap_or_default()))
    }

    /// Ids of every book in the catalog.
    pub async fn ids(&self) -> Result<Vec<String>, DbError> {
        Ok(sqlx::query_scalar("SELECT id FROM books ORDER BY rowid")
            .fetch_all(self.db.pool())
            .await?)
    }

    /// Overwrite the catalog fields of a book, leaving aggregates untouched.
    pub async fn update_catalog(&self, id: &str, draft: &BookDraft) -> Result<Option<Book>, DbError> {
        let sql = format!(
            "UPDATE books SET title = ?, author = ?, description = ?, cover_image = ?,
                isbn = ?, genre = ?, published_year = ?, updated_at = ?
             WHERE id = ?
             RETURNING {COLUMNS}"
        );
        sqlx::query(&sql)
            .bind(&draft.title)
            .bind(&draft.author)
            .bind(&draft.description)
            .bind(&draft.cover_image)
            .bind(&draft.isbn)
            .bind(draft.genre.as_str())
            .bind(draft.published_year)
            .bind(utils::to_unix_nanos(utils::now()))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| book_from_row(&row))
            .transpose()
    }

    /// Delete a book. Its reviews and their likes go with it in the same
    /// transaction. Returns how many reviews were removed, or `None` if the
    /// book did not exist.
    pub async fn delete(&self, id: &str) -> Result<Option<u64>, DbError> {
        let mut tx = self.db.begin().await?;

        let reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE book_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok((deleted > 0).then(|| u64::try_from(reviews).unwrap_or_default()))
    }

    /// Remove every book, and with them every review.
    pub async fn clear(&self) -> Result<u64, DbError> {
        Ok(sqlx::query("DELETE FROM books")
            .execute(self.db.pool())
            .await?
            .rows_affected())
    }
}

fn book_from_row(row: &SqliteRow) -> Result<Book, DbError> {
    let genre: String = row.try_get("genre")?;
    let review_count: i64 = row.try_get("review_count")?;

    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        description: row.try_get("description")?,
        cover_image: row.try_get("cover_image")?,
        isbn: row.try_get("isbn")?,
        genre: genre
            .parse()
            .map_err(|e: super::models::UnknownGenre| DbError::corrupt("genre", e.to_string()))?,
        published_year: row.try_get("published_year")?,
        average_rating: row.try_get("average_rating")?,
        review_count: u64::try_from(review_count)
            .map_err(|e| DbError::corrupt("review_count", e.to_string()))?,
        added_by: row.try_get("added_by")?,
        created_at: utils::from_unix_nanos("created_at", row.try_get("created_at")?)?,
        updated_at: utils::from_unix_nanos("updated_at", row.try_get("updated_at")?)?,
    })
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn count_to_sql<N: TryInto<i64>>(n: N) -> i64 {
    n.try_into().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::{Genre, SortField};

    fn book(isbn: &str) -> Book {
        let now = utils::now();
        Book {
            id: lectern_db::new_id(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: "Spice and sand.".to_string(),
            cover_image: String::new(),
            isbn: isbn.to_string(),
            genre: Genre::ScienceFiction,
            published_year: 1965,
            average_rating: 0.0,
            review_count: 0,
            added_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn repo() -> BookRepository {
        let db = Database::in_memory().await.unwrap();
        db.apply_migration("books:001_init", SCHEMA).await.unwrap();
        db.apply_migration("reviews:001_init", crate::modules::reviews::repository::SCHEMA)
            .await
            .unwrap();
        BookRepository::new(db)
    }

    #[tokio::test]
    async fn isbn_is_unique() {
        let repo = repo().await;
        repo.insert(&book("123")).await.unwrap();
        let err = repo.insert(&book("123")).await.unwrap_err();
        assert!(err.violates_unique(TABLE, ISBN_UNIQUE), "{err:?}");
    }

    #[tokio::test]
    async fn stored_book_reads_back_unchanged() {
        let repo = repo().await;
        let stored = repo.insert(&book("123")).await.unwrap();

        let reloaded = repo.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(reloaded, stored);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn catalog_update_keeps_aggregates() {
        let repo = repo().await;
        let stored = repo
            .insert(&Book {
                average_rating: 3.5,
                review_count: 2,
                ..book("123")
            })
            .await
            .unwrap();

        let draft = BookDraft {
            title: "Dune Messiah".to_string(),
            author: stored.author.clone(),
            description: stored.description.clone(),
            cover_image: String::new(),
            isbn: stored.isbn.clone(),
            genre: Genre::ScienceFiction,
            published_year: 1969,
        };
        let updated = repo.update_catalog(&stored.id, &draft).await.unwrap().unwrap();
        assert_eq!(updated.title, "Dune Messiah");
        assert_eq!(updated.average_rating, 3.5);
        assert_eq!(updated.review_count, 2);
        assert_eq!(updated.created_at, stored.created_at);

        assert!(repo.update_catalog("missing", &draft).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_escapes_like_wildcards() {
        let repo = repo().await;
        repo.insert(&Book {
            title: "100% Pure".to_string(),
            ..book("1")
        })
        .await
        .unwrap();
        repo.insert(&book("2")).await.unwrap();

        let filter = |search: &str| BookFilter {
            search: Some(search.to_string()),
            ..BookFilter::default()
        };
        let (_, total) = repo.find(&filter("0% p"), Pagination::default()).await.unwrap();
        assert_eq!(total, 1);
        let (_, total) = repo.find(&filter("%"), Pagination::default()).await.unwrap();
        assert_eq!(total, 1);
        let (_, total) = repo.find(&filter("SPICE"), Pagination::default()).await.unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn find_sorts_and_pages() {
        let repo = repo().await;
        for (isbn, year) in [("1", 1990), ("2", 1970), ("3", 1980)] {
            repo.insert(&Book {
                published_year: year,
                ..book(isbn)
            })
            .await
            .unwrap();
        }

        let filter = BookFilter {
            sort: SortField::PublishedYear,
            ..BookFilter::default()
        };
        let (page, total) = repo
            .find(&filter, Pagination::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(total, 3);
        let years: Vec<_> = page.iter().map(|b| b.published_year).collect();
        assert_eq!(years, vec![1970, 1980]);

        let (beyond, total) = repo
            .find(&filter, Pagination::new(Some(i64::MAX), Some(10)))
            .await
            .unwrap();
        assert!(beyond.is_empty());
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn delete_reports_missing_book() {
        let repo = repo().await;
        let stored = repo.insert(&book("123")).await.unwrap();

        assert_eq!(repo.delete(&stored.id).await.unwrap(), Some(0));
        assert_eq!(repo.delete(&stored.id).await.unwrap(), None);
        assert!(repo.ids().await.unwrap().is_empty());
    }
}
