//! Inventory ledger: checked debits and credits of a book's quantity

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{id::RecordId, inventory::StockMovement},
    repository::BooksStore,
};

/// Idle per-book locks are pruned once the registry grows past this
const LOCK_REGISTRY_PRUNE_AT: usize = 1024;

/// Owns the quantity rules for books touched by the loan workflow.
///
/// Debit and credit only produce a checked [`StockMovement`]; the loan store
/// persists it together with the loan transition. Callers hold
/// [`InventoryLedger::lock`] for the book across check and persist so
/// concurrent confirms and returns on one book run one at a time.
#[derive(Clone)]
pub struct InventoryLedger {
    books: Arc<dyn BooksStore>,
    locks: Arc<Mutex<HashMap<RecordId, Arc<Mutex<()>>>>>,
}

impl InventoryLedger {
    pub fn new(books: Arc<dyn BooksStore>) -> Self {
        Self {
            books,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serialize stock changes on one book
    pub async fn lock(&self, book_id: RecordId) -> OwnedMutexGuard<()> {
        let book_lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= LOCK_REGISTRY_PRUNE_AT {
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks
                .entry(book_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        book_lock.lock_owned().await
    }

    /// Available copies of a book
    pub async fn quantity(&self, book_id: RecordId) -> AppResult<i32> {
        self.books
            .get(book_id)
            .await?
            .map(|book| book.quantity)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }

    /// Take `amount` copies out of stock
    pub async fn debit(&self, book_id: RecordId, amount: i32) -> AppResult<StockMovement> {
        let quantity = self.quantity(book_id).await?;
        let movement = StockMovement::debit(book_id, amount);

        if movement.apply_to(quantity).is_none() {
            tracing::info!(
                book_id = %book_id,
                available = quantity,
                requested = amount,
                "Debit refused: not enough copies"
            );
            return Err(AppError::InsufficientInventory(format!(
                "Only {} copies available, {} requested",
                quantity, amount
            )));
        }

        tracing::debug!(book_id = %book_id, amount, from = quantity, "Stock debit checked");
        Ok(movement)
    }

    /// Put `amount` copies back into stock. No upper bound is enforced.
    pub async fn credit(&self, book_id: RecordId, amount: i32) -> AppResult<StockMovement> {
        let quantity = self.quantity(book_id).await?;
        let movement = StockMovement::credit(book_id, amount);

        if movement.apply_to(quantity).is_none() {
            return Err(AppError::Internal(format!(
                "Quantity overflow crediting book {}",
                book_id
            )));
        }

        tracing::debug!(book_id = %book_id, amount, from = quantity, "Stock credit checked");
        Ok(movement)
    }
}
