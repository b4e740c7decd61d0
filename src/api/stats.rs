//! Statistics endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{book::Book, id::RecordId, loan::LoansByState, student::StudentDetails},
    AppState,
};

use super::AuthenticatedUser;

/// Book with the most loans
#[derive(Debug, Serialize, ToSchema)]
pub struct MostLoanedBook {
    pub book_id: RecordId,
    pub total_loans: i64,
    pub book: Book,
}

/// Student with the most loans
#[derive(Debug, Serialize, ToSchema)]
pub struct MostActiveStudent {
    pub student_id: RecordId,
    pub total_loans: i64,
    pub student: StudentDetails,
}

/// Loan totals over the whole collection
#[derive(Debug, Serialize, ToSchema)]
pub struct LoanDashboard {
    pub total_loans: i64,
    pub total_pending_loans: i64,
    pub total_confirmed_loans: i64,
    pub total_rejected_loans: i64,
    pub total_returned_loans: i64,
    pub total_cancelled_loans: i64,
    /// Ties go to the book whose first loan is oldest. Absent when there
    /// are no loans or the book record is gone.
    pub most_loaned_book: Option<MostLoanedBook>,
    /// Same tie rule as `most_loaned_book`
    pub student_with_most_loans: Option<MostActiveStudent>,
}

/// Dashboard response
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub dashboard: LoanDashboard,
    /// All loans by state, students joined down to their section
    pub loans: LoansByState,
}

/// Catalog and directory sizes
#[derive(Debug, Serialize, ToSchema)]
pub struct LibraryCounts {
    pub total_books: i64,
    pub total_students: i64,
    pub total_sections: i64,
    pub total_subsections: i64,
}

/// Loan dashboard
#[utoipa::path(
    get,
    path = "/stats/loans/dashboard",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loan dashboard", body = DashboardResponse),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn get_loan_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardResponse>> {
    claims.require_admin()?;
    Ok(Json(state.services.stats.dashboard().await?))
}

/// Library counts
#[utoipa::path(
    get,
    path = "/stats/library",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library counts", body = LibraryCounts)
    )
)]
pub async fn get_library_counts(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<LibraryCounts>> {
    Ok(Json(state.services.stats.library_counts().await?))
}
