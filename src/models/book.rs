//! Book (catalog) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::id::RecordId;
use crate::error::AppError;

/// Catalog visibility of a book. Independent from its available quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Active,
    Inactive,
    Deleted,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Active => "active",
            BookStatus::Inactive => "inactive",
            BookStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(BookStatus::Active),
            "inactive" => Ok(BookStatus::Inactive),
            "deleted" => Ok(BookStatus::Deleted),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

/// Book as exposed by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: RecordId,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    /// Copies currently available for lending
    pub quantity: i32,
    /// Cover image URL
    pub cover_image: String,
    pub status: BookStatus,
    pub categories: Vec<RecordId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `books` table
#[derive(Debug, FromRow)]
pub struct BookRow {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub quantity: i32,
    pub cover_image: String,
    pub status: String,
    pub categories: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookRow> for Book {
    type Error = AppError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Book {
            id: row.id.into(),
            title: row.title,
            author: row.author,
            publisher: row.publisher,
            description: row.description,
            quantity: row.quantity,
            cover_image: row.cover_image,
            status: row.status.parse().map_err(AppError::Internal)?,
            categories: row.categories.into_iter().map(RecordId::from).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    /// Already uploaded cover image URL
    #[validate(url(message = "Cover image must be a URL"))]
    pub cover_image: String,
    #[serde(default)]
    pub categories: Vec<RecordId>,
}

impl Book {
    pub fn from_create(data: CreateBook) -> Self {
        let now = Utc::now();
        Book {
            id: RecordId::new(),
            title: data.title,
            author: data.author,
            publisher: data.publisher,
            description: data.description,
            quantity: data.quantity,
            cover_image: data.cover_image,
            status: BookStatus::Active,
            categories: data.categories,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Books partitioned by catalog status
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct BooksByStatus {
    pub active: Vec<Book>,
    pub inactive: Vec<Book>,
    pub deleted: Vec<Book>,
}

impl BooksByStatus {
    pub fn partition(books: Vec<Book>) -> Self {
        let mut result = Self::default();
        for book in books {
            match book.status {
                BookStatus::Active => result.active.push(book),
                BookStatus::Inactive => result.inactive.push(book),
                BookStatus::Deleted => result.deleted.push(book),
            }
        }
        result
    }
}
