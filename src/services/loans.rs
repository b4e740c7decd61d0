//! Loan management service: lifecycle transitions and loan views

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::inventory::InventoryLedger;
use crate::{
    config::LoanPolicy,
    error::{AppError, AppResult},
    models::{
        book::Book,
        id::RecordId,
        inventory::{StockDirection, StockMovement},
        loan::{
            CreateLoan, Loan, LoanAction, LoanChange, LoanDetails, LoanFilter, LoanState,
            LoansByState,
        },
        student::{StudentDetails, SubsectionDetails},
    },
    repository::Repository,
};

/// How deep the student side of a loan view is joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDepth {
    /// Book and student
    Student,
    /// Book, student, the student's subsection and its section
    Section,
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    ledger: InventoryLedger,
    policy: LoanPolicy,
}

impl LoansService {
    pub fn new(repository: Repository, ledger: InventoryLedger, policy: LoanPolicy) -> Self {
        Self {
            repository,
            ledger,
            policy,
        }
    }

    async fn load(&self, loan_id: RecordId) -> AppResult<Loan> {
        self.repository
            .loans
            .get(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    /// Get one loan with book and student joined
    pub async fn get_loan(&self, loan_id: &str) -> AppResult<LoanDetails> {
        let loan = self.load(RecordId::parse(loan_id)?).await?;
        self.single_details(loan).await
    }

    /// Create a new loan in the pending state
    pub async fn create_loan(&self, request: CreateLoan) -> AppResult<LoanDetails> {
        let new_loan = request.into_new_loan()?;

        if self.repository.books.get(new_loan.book_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Book with id {} not found",
                new_loan.book_id
            )));
        }
        if self.repository.students.get(new_loan.student_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Student with id {} not found",
                new_loan.student_id
            )));
        }

        let loan = self.repository.loans.insert(&new_loan).await?;

        tracing::info!(
            loan_id = %loan.id,
            book_id = %loan.book_id,
            student_id = %loan.student_id,
            quantity = loan.quantity,
            "Loan created, awaiting confirmation"
        );

        self.single_details(loan).await
    }

    /// Confirm a pending loan, taking its copies out of stock
    pub async fn confirm_loan(
        &self,
        loan_id: &str,
        return_date: Option<DateTime<Utc>>,
    ) -> AppResult<LoanDetails> {
        let loan = self
            .transition(RecordId::parse(loan_id)?, LoanAction::Confirm { return_date })
            .await?;
        self.single_details(loan).await
    }

    /// Reject a pending loan
    pub async fn reject_loan(
        &self,
        loan_id: &str,
        reason: Option<String>,
    ) -> AppResult<LoanDetails> {
        let loan = self
            .transition(RecordId::parse(loan_id)?, LoanAction::Reject { reason })
            .await?;
        self.single_details(loan).await
    }

    /// Cancel a pending loan
    pub async fn cancel_loan(&self, loan_id: &str) -> AppResult<LoanDetails> {
        let loan = self
            .transition(RecordId::parse(loan_id)?, LoanAction::Cancel)
            .await?;
        self.single_details(loan).await
    }

    /// Return a confirmed loan, putting its copies back into stock
    pub async fn return_loan(&self, loan_id: &str) -> AppResult<LoanDetails> {
        let loan = self
            .transition(RecordId::parse(loan_id)?, LoanAction::Return { at: Utc::now() })
            .await?;
        self.single_details(loan).await
    }

    /// Validate `action` against the loan's current state, check the stock
    /// movement it implies and persist both as one change.
    async fn transition(&self, loan_id: RecordId, action: LoanAction) -> AppResult<Loan> {
        let loan = self.load(loan_id).await?;
        let action_name = action.name();
        let direction = action.stock_direction();
        let status = loan.status.apply(action)?;

        let (_guard, movement) = match direction {
            Some(direction) => {
                let guard = self.ledger.lock(loan.book_id).await;
                let movement = match direction {
                    StockDirection::Debit => self.ledger.debit(loan.book_id, loan.quantity).await?,
                    StockDirection::Credit => {
                        self.ledger.credit(loan.book_id, loan.quantity).await?
                    }
                };
                (Some(guard), Some(movement))
            }
            None => (None, None),
        };

        let change = LoanChange {
            loan_id,
            expected: loan.state(),
            status,
            movement,
        };
        let updated = self.repository.loans.apply(&change).await?;

        tracing::info!(
            loan_id = %loan_id,
            book_id = %updated.book_id,
            action = action_name,
            from = %loan.state(),
            to = %updated.state(),
            stock = ?change.movement.map(|m| m.direction),
            "Loan transition applied"
        );

        Ok(updated)
    }

    /// Permanently remove a loan. Bypasses the lifecycle rules; inventory of a
    /// confirmed loan is only restored when the policy says so.
    pub async fn delete_loan(&self, loan_id: &str) -> AppResult<()> {
        let loan_id = RecordId::parse(loan_id)?;
        let loan = self.load(loan_id).await?;

        let outstanding = loan.state() == LoanState::Confirmed;
        let _guard = if outstanding && self.policy.restore_inventory_on_delete {
            Some(self.ledger.lock(loan.book_id).await)
        } else {
            None
        };

        let movement = match (outstanding, self.policy.restore_inventory_on_delete) {
            (true, true) => Some(StockMovement::credit(loan.book_id, loan.quantity)),
            (true, false) => {
                tracing::warn!(
                    loan_id = %loan_id,
                    book_id = %loan.book_id,
                    quantity = loan.quantity,
                    "Deleting a confirmed loan without restoring its copies"
                );
                None
            }
            _ => None,
        };

        if !self.repository.loans.delete(loan_id, loan.state(), movement).await? {
            return Err(AppError::NotFound(format!("Loan with id {} not found", loan_id)));
        }

        tracing::info!(loan_id = %loan_id, restored = movement.is_some(), "Loan deleted");
        Ok(())
    }

    /// All loans in `state`, with book and student joined
    pub async fn find_by_state(&self, state: LoanState) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.find(LoanFilter::by_state(state)).await?;
        self.details(loans, JoinDepth::Student).await
    }

    /// Loans awaiting an admin decision
    pub async fn find_pending(&self) -> AppResult<Vec<LoanDetails>> {
        self.find_by_state(LoanState::Pending).await
    }

    /// A student's loans, partitioned into the five lifecycle buckets
    pub async fn find_by_student(&self, student_id: &str) -> AppResult<LoansByState> {
        let student_id = RecordId::parse(student_id)?;
        if self.repository.students.get(student_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Student with id {} not found",
                student_id
            )));
        }

        let loans = self
            .repository
            .loans
            .find(LoanFilter::by_student(student_id))
            .await?;
        Ok(LoansByState::partition(
            self.details(loans, JoinDepth::Student).await?,
        ))
    }

    async fn single_details(&self, loan: Loan) -> AppResult<LoanDetails> {
        self.details(vec![loan], JoinDepth::Student)
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Loan join produced no rows".to_string()))
    }

    /// Join books and students onto loans. Dangling references join as `None`.
    pub async fn details(&self, loans: Vec<Loan>, depth: JoinDepth) -> AppResult<Vec<LoanDetails>> {
        let book_ids = distinct(loans.iter().map(|l| l.book_id));
        let student_ids = distinct(loans.iter().map(|l| l.student_id));

        let books: HashMap<RecordId, Book> = self
            .repository
            .books
            .get_many(&book_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        let mut students: HashMap<RecordId, StudentDetails> = self
            .repository
            .students
            .get_many(&student_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, StudentDetails::from(s)))
            .collect();

        if depth == JoinDepth::Section {
            self.join_sections(&mut students).await?;
        }

        Ok(loans
            .into_iter()
            .map(|loan| {
                let book = books.get(&loan.book_id).cloned();
                let student = students.get(&loan.student_id).cloned();
                LoanDetails::new(loan, book, student)
            })
            .collect())
    }

    async fn join_sections(&self, students: &mut HashMap<RecordId, StudentDetails>) -> AppResult<()> {
        let subsection_ids = distinct(students.values().map(|s| s.subsection_id));
        let subsections = self.repository.students.subsections(&subsection_ids).await?;

        let section_ids = distinct(subsections.iter().map(|s| s.section_id));
        let sections: HashMap<_, _> = self
            .repository
            .students
            .sections(&section_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let subsections: HashMap<_, _> = subsections
            .into_iter()
            .map(|s| {
                let details = SubsectionDetails {
                    id: s.id,
                    name: s.name,
                    section_id: s.section_id,
                    section: sections.get(&s.section_id).cloned(),
                };
                (s.id, details)
            })
            .collect();

        for student in students.values_mut() {
            student.subsection = subsections.get(&student.subsection_id).cloned();
        }
        Ok(())
    }
}

fn distinct(ids: impl Iterator<Item = RecordId>) -> Vec<RecordId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        models::{
            book::{Book, BookStatus},
            loan::{LoanStatus, NewLoan},
        },
        repository::{loans::MockLoansStore, BooksStore, LoansStore, MemoryStore},
    };

    fn book(quantity: i32) -> Book {
        let now = Utc::now();
        Book {
            id: RecordId::new(),
            title: "Pedro Páramo".into(),
            author: "Juan Rulfo".into(),
            publisher: None,
            description: None,
            quantity,
            cover_image: "https://img.example.org/pedro.png".into(),
            status: BookStatus::Active,
            categories: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_database_error() {
        let store = MemoryStore::new();
        let b = BooksStore::insert(&store, &book(3)).await.unwrap();
        let pending = Loan::from_new(NewLoan {
            book_id: b.id,
            student_id: RecordId::new(),
            quantity: 1,
            loan_date: Utc::now(),
            expect_return_date: Utc::now(),
        });

        let mut loans = MockLoansStore::new();
        let stored = pending.clone();
        loans
            .expect_get()
            .returning(move |_| Ok(Some(stored.clone())));
        loans
            .expect_apply()
            .returning(|_| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let mut repository = Repository::memory(store.clone());
        repository.loans = Arc::new(loans) as Arc<dyn LoansStore>;
        let ledger = InventoryLedger::new(repository.books.clone());
        let service = LoansService::new(repository, ledger, LoanPolicy::default());

        let err = service
            .confirm_loan(&pending.id.to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        // The debit was only checked, never persisted
        assert_eq!(BooksStore::get(&store, b.id).await.unwrap().unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_transition_sends_guarded_change() {
        let store = MemoryStore::new();
        let b = BooksStore::insert(&store, &book(4)).await.unwrap();
        let pending = LoansStore::insert(
            &store,
            &NewLoan {
                book_id: b.id,
                student_id: RecordId::new(),
                quantity: 2,
                loan_date: Utc::now(),
                expect_return_date: Utc::now(),
            },
        )
        .await
        .unwrap();

        let mut loans = MockLoansStore::new();
        let stored = pending.clone();
        loans
            .expect_get()
            .returning(move |_| Ok(Some(stored.clone())));
        let book_id = b.id;
        loans
            .expect_apply()
            .withf(move |change| {
                change.expected == LoanState::Pending
                    && change.status == LoanStatus::Confirmed { return_date: None }
                    && change.movement == Some(StockMovement::debit(book_id, 2))
            })
            .times(1)
            .returning(|change| {
                Err(AppError::InvalidTransition(format!(
                    "Loan {} changed concurrently",
                    change.loan_id
                )))
            });

        let mut repository = Repository::memory(store);
        repository.loans = Arc::new(loans) as Arc<dyn LoansStore>;
        let ledger = InventoryLedger::new(repository.books.clone());
        let service = LoansService::new(repository, ledger, LoanPolicy::default());

        assert!(matches!(
            service.confirm_loan(&pending.id.to_string(), None).await,
            Err(AppError::InvalidTransition(_))
        ));
    }
}
