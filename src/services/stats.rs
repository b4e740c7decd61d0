//! Statistics service: loan dashboard and library counts

use indexmap::IndexMap;

use super::loans::{JoinDepth, LoansService};
use crate::{
    api::stats::{DashboardResponse, LibraryCounts, LoanDashboard, MostActiveStudent, MostLoanedBook},
    error::AppResult,
    models::{
        id::RecordId,
        loan::{Loan, LoanFilter, LoanState, LoansByState},
        student::StudentDetails,
    },
    repository::Repository,
};

/// Counts derived from one pass over the loan collection.
///
/// Leaders are picked by strictly greater count while walking groups in
/// first-seen order, so on a tie the group whose first loan comes earliest
/// in collection order wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanAggregates {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub rejected: i64,
    pub cancelled: i64,
    pub returned: i64,
    pub most_loaned_book: Option<(RecordId, i64)>,
    pub most_active_student: Option<(RecordId, i64)>,
}

impl LoanAggregates {
    pub fn from_loans(loans: &[Loan]) -> Self {
        let mut aggregates = Self::default();
        let mut by_book: IndexMap<RecordId, i64> = IndexMap::new();
        let mut by_student: IndexMap<RecordId, i64> = IndexMap::new();

        for loan in loans {
            aggregates.total += 1;
            *aggregates.count_mut(loan.state()) += 1;
            *by_book.entry(loan.book_id).or_default() += 1;
            *by_student.entry(loan.student_id).or_default() += 1;
        }

        aggregates.most_loaned_book = leader(&by_book);
        aggregates.most_active_student = leader(&by_student);
        aggregates
    }

    pub fn count(&self, state: LoanState) -> i64 {
        match state {
            LoanState::Pending => self.pending,
            LoanState::Confirmed => self.confirmed,
            LoanState::Rejected => self.rejected,
            LoanState::Cancelled => self.cancelled,
            LoanState::Returned => self.returned,
        }
    }

    fn count_mut(&mut self, state: LoanState) -> &mut i64 {
        match state {
            LoanState::Pending => &mut self.pending,
            LoanState::Confirmed => &mut self.confirmed,
            LoanState::Rejected => &mut self.rejected,
            LoanState::Cancelled => &mut self.cancelled,
            LoanState::Returned => &mut self.returned,
        }
    }
}

fn leader(groups: &IndexMap<RecordId, i64>) -> Option<(RecordId, i64)> {
    let mut best: Option<(RecordId, i64)> = None;
    for (id, count) in groups {
        if best.map_or(true, |(_, top)| *count > top) {
            best = Some((*id, *count));
        }
    }
    best
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
    loans: LoansService,
}

impl StatsService {
    pub fn new(repository: Repository, loans: LoansService) -> Self {
        Self { repository, loans }
    }

    /// Loan dashboard: totals, leaders and the five status lists.
    ///
    /// Everything is derived from a single read of the collection so the
    /// totals always agree with the lists.
    pub async fn dashboard(&self) -> AppResult<DashboardResponse> {
        let loans = self.repository.loans.find(LoanFilter::all()).await?;
        let aggregates = LoanAggregates::from_loans(&loans);

        let most_loaned_book = match aggregates.most_loaned_book {
            Some((book_id, total_loans)) => self
                .repository
                .books
                .get(book_id)
                .await?
                .map(|book| MostLoanedBook {
                    book_id,
                    total_loans,
                    book,
                }),
            None => None,
        };

        let student_with_most_loans = match aggregates.most_active_student {
            Some((student_id, total_loans)) => self
                .repository
                .students
                .get(student_id)
                .await?
                .map(|student| MostActiveStudent {
                    student_id,
                    total_loans,
                    student: StudentDetails::from(student),
                }),
            None => None,
        };

        let details = self.loans.details(loans, JoinDepth::Section).await?;

        tracing::debug!(total = aggregates.total, "Loan dashboard computed");

        Ok(DashboardResponse {
            dashboard: LoanDashboard {
                total_loans: aggregates.total,
                total_pending_loans: aggregates.pending,
                total_confirmed_loans: aggregates.confirmed,
                total_rejected_loans: aggregates.rejected,
                total_returned_loans: aggregates.returned,
                total_cancelled_loans: aggregates.cancelled,
                most_loaned_book,
                student_with_most_loans,
            },
            loans: LoansByState::partition(details),
        })
    }

    /// Catalog and directory sizes
    pub async fn library_counts(&self) -> AppResult<LibraryCounts> {
        let total_books = self.repository.books.count().await?;
        let directory = self.repository.students.counts().await?;

        Ok(LibraryCounts {
            total_books,
            total_students: directory.students,
            total_sections: directory.sections,
            total_subsections: directory.subsections,
        })
    }
}
