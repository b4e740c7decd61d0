//! Process-local store implementing every repository trait.
//!
//! Each write takes the single state lock, so a loan change and its stock
//! movement are observed together or not at all.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::{books::BooksStore, loans::LoansStore, students::StudentsStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookStatus},
        id::RecordId,
        inventory::StockMovement,
        loan::{Loan, LoanChange, LoanFilter, LoanState, NewLoan},
        student::{DirectoryCounts, Section, Student, Subsection},
    },
};

#[derive(Default)]
struct MemoryState {
    books: HashMap<RecordId, Book>,
    // Insertion order is collection order
    loans: IndexMap<RecordId, Loan>,
    students: HashMap<RecordId, Student>,
    subsections: HashMap<RecordId, Subsection>,
    sections: HashMap<RecordId, Section>,
}

impl MemoryState {
    /// Apply a movement to the in-memory book, or explain why it cannot be
    fn move_stock(&mut self, movement: &StockMovement) -> AppResult<()> {
        let book = self.books.get_mut(&movement.book_id).ok_or_else(|| {
            AppError::NotFound(format!("Book with id {} not found", movement.book_id))
        })?;

        let quantity = movement.apply_to(book.quantity).ok_or_else(|| {
            AppError::InsufficientInventory(format!(
                "Not enough copies of book {} available",
                movement.book_id
            ))
        })?;

        book.quantity = quantity;
        book.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory records are owned by another service; these seed them
    pub async fn insert_section(&self, section: Section) {
        self.state.write().await.sections.insert(section.id, section);
    }

    pub async fn insert_subsection(&self, subsection: Subsection) {
        self.state
            .write()
            .await
            .subsections
            .insert(subsection.id, subsection);
    }

    pub async fn insert_student(&self, student: Student) {
        self.state.write().await.students.insert(student.id, student);
    }

    /// Remove a book outright (catalog deletes are soft, this is for fixtures)
    pub async fn purge_book(&self, id: RecordId) -> bool {
        self.state.write().await.books.remove(&id).is_some()
    }
}

#[async_trait]
impl BooksStore for MemoryStore {
    async fn get(&self, id: RecordId) -> AppResult<Option<Book>> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[RecordId]) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.books.get(id).cloned()).collect())
    }

    async fn insert(&self, book: &Book) -> AppResult<Book> {
        self.state.write().await.books.insert(book.id, book.clone());
        Ok(book.clone())
    }

    async fn list(&self, status: Option<BookStatus>) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    async fn set_status(&self, id: RecordId, status: BookStatus) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        Ok(state.books.get_mut(&id).map(|book| {
            book.status = status;
            book.updated_at = Utc::now();
            book.clone()
        }))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.state.read().await.books.len() as i64)
    }
}

#[async_trait]
impl LoansStore for MemoryStore {
    async fn get(&self, id: RecordId) -> AppResult<Option<Loan>> {
        Ok(self.state.read().await.loans.get(&id).cloned())
    }

    async fn insert(&self, loan: &NewLoan) -> AppResult<Loan> {
        let loan = Loan::from_new(loan.clone());
        self.state.write().await.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn find(&self, filter: LoanFilter) -> AppResult<Vec<Loan>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .values()
            .filter(|loan| filter.matches(loan))
            .cloned()
            .collect())
    }

    async fn apply(&self, change: &LoanChange) -> AppResult<Loan> {
        let mut state = self.state.write().await;

        let current = state
            .loans
            .get(&change.loan_id)
            .map(Loan::state)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", change.loan_id)))?;

        if current != change.expected {
            return Err(AppError::InvalidTransition(format!(
                "Loan {} is {}, expected {}",
                change.loan_id, current, change.expected
            )));
        }

        if let Some(movement) = &change.movement {
            state.move_stock(movement)?;
        }

        let loan = state
            .loans
            .get_mut(&change.loan_id)
            .ok_or_else(|| AppError::Internal("Loan vanished under write lock".to_string()))?;
        loan.status = change.status.clone();
        loan.updated_at = Utc::now();
        Ok(loan.clone())
    }

    async fn delete(
        &self,
        id: RecordId,
        expected: LoanState,
        movement: Option<StockMovement>,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;

        let current = match state.loans.get(&id) {
            Some(loan) => loan.state(),
            None => return Ok(false),
        };
        if current != expected {
            return Err(AppError::InvalidTransition(format!(
                "Loan {} is {}, expected {}",
                id, current, expected
            )));
        }

        if let Some(movement) = &movement {
            state.move_stock(movement)?;
        }

        state.loans.shift_remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl StudentsStore for MemoryStore {
    async fn get(&self, id: RecordId) -> AppResult<Option<Student>> {
        Ok(self.state.read().await.students.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[RecordId]) -> AppResult<Vec<Student>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.students.get(id).cloned())
            .collect())
    }

    async fn subsections(&self, ids: &[RecordId]) -> AppResult<Vec<Subsection>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.subsections.get(id).cloned())
            .collect())
    }

    async fn sections(&self, ids: &[RecordId]) -> AppResult<Vec<Section>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.sections.get(id).cloned())
            .collect())
    }

    async fn counts(&self) -> AppResult<DirectoryCounts> {
        let state = self.state.read().await;
        Ok(DirectoryCounts {
            students: state.students.len() as i64,
            sections: state.sections.len() as i64,
            subsections: state.subsections.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loan::LoanStatus;

    fn book(quantity: i32) -> Book {
        let now = Utc::now();
        Book {
            id: RecordId::new(),
            title: "Cien años de soledad".into(),
            author: "Gabriel García Márquez".into(),
            publisher: None,
            description: None,
            quantity,
            cover_image: "https://img.example.org/cien.png".into(),
            status: BookStatus::Active,
            categories: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    async fn pending_loan(store: &MemoryStore, book_id: RecordId, quantity: i32) -> Loan {
        LoansStore::insert(
            store,
            &NewLoan {
                book_id,
                student_id: RecordId::new(),
                quantity,
                loan_date: Utc::now(),
                expect_return_date: Utc::now(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_debit_leaves_loan_untouched() {
        let store = MemoryStore::new();
        let b = BooksStore::insert(&store, &book(1)).await.unwrap();
        let loan = pending_loan(&store, b.id, 2).await;

        let err = store
            .apply(&LoanChange {
                loan_id: loan.id,
                expected: LoanState::Pending,
                status: LoanStatus::Confirmed { return_date: None },
                movement: Some(StockMovement::debit(b.id, 2)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientInventory(_)));

        let stored = LoansStore::get(&store, loan.id).await.unwrap().unwrap();
        assert_eq!(stored.state(), LoanState::Pending);
        assert_eq!(BooksStore::get(&store, b.id).await.unwrap().unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_stale_expected_state_is_refused() {
        let store = MemoryStore::new();
        let b = BooksStore::insert(&store, &book(5)).await.unwrap();
        let loan = pending_loan(&store, b.id, 1).await;

        let change = LoanChange {
            loan_id: loan.id,
            expected: LoanState::Pending,
            status: LoanStatus::Confirmed { return_date: None },
            movement: Some(StockMovement::debit(b.id, 1)),
        };
        store.apply(&change).await.unwrap();

        assert!(matches!(
            store.apply(&change).await,
            Err(AppError::InvalidTransition(_))
        ));
        assert_eq!(BooksStore::get(&store, b.id).await.unwrap().unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn test_find_keeps_insertion_order_after_delete() {
        let store = MemoryStore::new();
        let b = BooksStore::insert(&store, &book(5)).await.unwrap();
        let first = pending_loan(&store, b.id, 1).await;
        let second = pending_loan(&store, b.id, 1).await;
        let third = pending_loan(&store, b.id, 1).await;

        assert!(matches!(
            LoansStore::delete(&store, second.id, LoanState::Confirmed, None).await,
            Err(AppError::InvalidTransition(_))
        ));
        assert!(LoansStore::delete(&store, second.id, LoanState::Pending, None)
            .await
            .unwrap());
        assert!(!LoansStore::delete(&store, second.id, LoanState::Pending, None)
            .await
            .unwrap());

        let ids: Vec<RecordId> = store
            .find(LoanFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![first.id, third.id]);
    }
}
