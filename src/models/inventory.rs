//! Stock movements applied to a book's available quantity

use serde::Serialize;

use super::id::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    Debit,
    Credit,
}

/// A checked change to a book's quantity, persisted together with the loan
/// transition that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    pub book_id: RecordId,
    pub direction: StockDirection,
    pub amount: i32,
}

impl StockMovement {
    pub fn debit(book_id: RecordId, amount: i32) -> Self {
        Self {
            book_id,
            direction: StockDirection::Debit,
            amount,
        }
    }

    pub fn credit(book_id: RecordId, amount: i32) -> Self {
        Self {
            book_id,
            direction: StockDirection::Credit,
            amount,
        }
    }

    /// Quantity after the movement, or `None` when a debit would go negative.
    pub fn apply_to(&self, quantity: i32) -> Option<i32> {
        match self.direction {
            StockDirection::Debit if quantity < self.amount => None,
            StockDirection::Debit => Some(quantity - self.amount),
            StockDirection::Credit => quantity.checked_add(self.amount),
        }
    }
}
