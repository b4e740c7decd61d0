//! Repository layer (persistence gateway)

pub mod books;
pub mod loans;
pub mod memory;
pub mod students;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use books::BooksStore;
pub use loans::LoansStore;
pub use memory::MemoryStore;
pub use students::StudentsStore;

/// Main repository struct holding one store per collection
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BooksStore>,
    pub loans: Arc<dyn LoansStore>,
    pub students: Arc<dyn StudentsStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBooksStore::new(pool.clone())),
            loans: Arc::new(loans::PgLoansStore::new(pool.clone())),
            students: Arc::new(students::PgStudentsStore::new(pool)),
        }
    }

    /// Create a repository whose collections all live in `store`
    pub fn memory(store: MemoryStore) -> Self {
        Self {
            books: Arc::new(store.clone()),
            loans: Arc::new(store.clone()),
            students: Arc::new(store),
        }
    }
}
