//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookStatus, BooksByStatus, CreateBook},
        id::RecordId,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get book by ID
    pub async fn get_book(&self, id: &str) -> AppResult<Book> {
        let id = RecordId::parse(id)?;
        self.repository
            .books
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// All books, partitioned by catalog status
    pub async fn list_books(&self) -> AppResult<BooksByStatus> {
        Ok(BooksByStatus::partition(self.repository.books.list(None).await?))
    }

    /// Books currently offered for loan
    pub async fn list_active(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list(Some(BookStatus::Active)).await
    }

    /// Create a new book. The cover image must already be uploaded.
    pub async fn create_book(&self, data: CreateBook) -> AppResult<Book> {
        data.validate()?;

        let book = self.repository.books.insert(&Book::from_create(data)).await?;
        tracing::info!(book_id = %book.id, quantity = book.quantity, "Book created");
        Ok(book)
    }

    /// Change a book's catalog status. Quantity is left untouched.
    pub async fn set_status(&self, id: &str, status: BookStatus) -> AppResult<Book> {
        let id = RecordId::parse(id)?;
        let book = self
            .repository
            .books
            .set_status(id, status)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        tracing::info!(book_id = %id, status = %status, "Book status changed");
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn create(title: &str, quantity: i32) -> CreateBook {
        CreateBook {
            title: title.into(),
            author: "Isabel Allende".into(),
            publisher: None,
            description: None,
            quantity,
            cover_image: "https://img.example.org/cover.png".into(),
            categories: vec![],
        }
    }

    #[tokio::test]
    async fn test_status_changes_keep_quantity() {
        let service = CatalogService::new(Repository::memory(MemoryStore::new()));
        let book = service.create_book(create("La casa de los espíritus", 4)).await.unwrap();

        let deleted = service
            .set_status(&book.id.to_string(), BookStatus::Deleted)
            .await
            .unwrap();
        assert_eq!(deleted.status, BookStatus::Deleted);
        assert_eq!(deleted.quantity, 4);

        let listing = service.list_books().await.unwrap();
        assert_eq!(listing.deleted.len(), 1);
        assert!(listing.active.is_empty());
        assert!(service.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_negative_quantity() {
        let service = CatalogService::new(Repository::memory(MemoryStore::new()));
        assert!(matches!(
            service.create_book(create("Paula", -1)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_id_is_validation_error() {
        let service = CatalogService::new(Repository::memory(MemoryStore::new()));
        assert!(matches!(
            service.get_book("not-a-uuid").await,
            Err(AppError::Validation(_))
        ));
    }
}
