//! Books repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookRow, BookStatus},
        id::RecordId,
    },
};

/// Catalog access needed by the loan workflow and the catalog service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksStore: Send + Sync {
    async fn get(&self, id: RecordId) -> AppResult<Option<Book>>;
    async fn get_many(&self, ids: &[RecordId]) -> AppResult<Vec<Book>>;
    async fn insert(&self, book: &Book) -> AppResult<Book>;
    /// All books, or only those with `status`, ordered by title
    async fn list(&self, status: Option<BookStatus>) -> AppResult<Vec<Book>>;
    async fn set_status(&self, id: RecordId, status: BookStatus) -> AppResult<Option<Book>>;
    async fn count(&self) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct PgBooksStore {
    pool: Pool<Postgres>,
}

impl PgBooksStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksStore for PgBooksStore {
    async fn get(&self, id: RecordId) -> AppResult<Option<Book>> {
        sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Book::try_from)
            .transpose()
    }

    async fn get_many(&self, ids: &[RecordId]) -> AppResult<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(RecordId::as_uuid).collect();

        sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Book::try_from)
            .collect()
    }

    async fn insert(&self, book: &Book) -> AppResult<Book> {
        let categories: Vec<Uuid> = book.categories.iter().map(RecordId::as_uuid).collect();

        let row = sqlx::query_as::<_, BookRow>(
            r#"
            INSERT INTO books (id, title, author, publisher, description, quantity,
                               cover_image, status, categories, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.description)
        .bind(book.quantity)
        .bind(&book.cover_image)
        .bind(book.status.as_str())
        .bind(&categories)
        .bind(book.created_at)
        .bind(book.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Book::try_from(row)
    }

    async fn list(&self, status: Option<BookStatus>) -> AppResult<Vec<Book>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE status = $1 ORDER BY title")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, BookRow>("SELECT * FROM books ORDER BY title")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Book::try_from).collect()
    }

    async fn set_status(&self, id: RecordId, status: BookStatus) -> AppResult<Option<Book>> {
        sqlx::query_as::<_, BookRow>(
            "UPDATE books SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Book::try_from)
        .transpose()
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
