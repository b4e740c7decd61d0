//! Loan management endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::loan::{CreateLoan, LoanDetails, LoanState, LoansByState},
    AppState,
};

use super::AuthenticatedUser;

/// Parse an optional JSON body. An empty body means defaults; anything
/// else must parse.
fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

/// Confirm loan request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConfirmLoanRequest {
    /// Agreed return date, if different from the requested one
    pub return_date: Option<DateTime<Utc>>,
}

/// Reject loan request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectLoanRequest {
    pub rejection_reason: Option<String>,
}

/// Loan action response
#[derive(Serialize, ToSchema)]
pub struct LoanActionResponse {
    /// Status message
    pub message: String,
    /// Loan after the action
    pub loan: LoanDetails,
}

impl LoanActionResponse {
    fn new(message: &str, loan: LoanDetails) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            loan,
        })
    }
}

/// Create a new loan request (pending until an admin confirms it)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanActionResponse),
        (status = 400, description = "Missing fields or invalid identifiers"),
        (status = 404, description = "Book or student not found")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanActionResponse>)> {
    let loan = state.services.loans.create_loan(request).await?;
    tracing::debug!(loan_id = %loan.id, requested_by = %claims.username, "Loan requested");

    Ok((
        StatusCode::CREATED,
        LoanActionResponse::new("Loan created successfully", loan),
    ))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<LoanDetails>> {
    Ok(Json(state.services.loans.get_loan(&id).await?))
}

/// List loans awaiting confirmation
#[utoipa::path(
    get,
    path = "/loans/pending",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending loans", body = Vec<LoanDetails>),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_pending_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;
    Ok(Json(state.services.loans.find_pending().await?))
}

/// List loans in a given state
#[utoipa::path(
    get,
    path = "/loans/status/{state}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("state" = LoanState, Path, description = "pending, confirmed, rejected, cancelled or returned")),
    responses(
        (status = 200, description = "Loans in state", body = Vec<LoanDetails>),
        (status = 400, description = "Unknown state"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_loans_by_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_state): Path<String>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loan_state: LoanState = loan_state.parse().map_err(AppError::Validation)?;
    Ok(Json(state.services.loans.find_by_state(loan_state).await?))
}

/// List a student's loans, grouped by state
#[utoipa::path(
    get,
    path = "/loans/student/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student loans by state", body = LoansByState),
        (status = 404, description = "Student not found")
    )
)]
pub async fn list_student_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(student_id): Path<String>,
) -> AppResult<Json<LoansByState>> {
    Ok(Json(state.services.loans.find_by_student(&student_id).await?))
}

/// Confirm a pending loan, taking the copies out of stock
#[utoipa::path(
    put,
    path = "/loans/{id}/confirm",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Loan ID")),
    request_body(content = ConfirmLoanRequest, description = "Optional return date"),
    responses(
        (status = 200, description = "Loan confirmed", body = LoanActionResponse),
        (status = 400, description = "Not enough copies available"),
        (status = 404, description = "Loan or book not found"),
        (status = 409, description = "Loan is not pending")
    )
)]
pub async fn confirm_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<LoanActionResponse>> {
    claims.require_admin()?;

    let request: ConfirmLoanRequest = optional_body(&body)?;
    let loan = state.services.loans.confirm_loan(&id, request.return_date).await?;
    Ok(LoanActionResponse::new("Loan confirmed", loan))
}

/// Reject a pending loan
#[utoipa::path(
    put,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Loan ID")),
    request_body(content = RejectLoanRequest, description = "Optional rejection reason"),
    responses(
        (status = 200, description = "Loan rejected", body = LoanActionResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not pending")
    )
)]
pub async fn reject_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<LoanActionResponse>> {
    claims.require_admin()?;

    let request: RejectLoanRequest = optional_body(&body)?;
    let loan = state
        .services
        .loans
        .reject_loan(&id, request.rejection_reason)
        .await?;
    Ok(LoanActionResponse::new("Loan rejected", loan))
}

/// Cancel a pending loan
#[utoipa::path(
    put,
    path = "/loans/{id}/cancel",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan cancelled", body = LoanActionResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not pending")
    )
)]
pub async fn cancel_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state.services.loans.cancel_loan(&id).await?;
    Ok(LoanActionResponse::new("Loan cancelled", loan))
}

/// Return a confirmed loan, putting the copies back into stock
#[utoipa::path(
    put,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan returned", body = LoanActionResponse),
        (status = 404, description = "Loan or book not found"),
        (status = 409, description = "Loan is not confirmed")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<LoanActionResponse>> {
    claims.require_admin()?;

    let loan = state.services.loans.return_loan(&id).await?;
    Ok(LoanActionResponse::new("Loan returned", loan))
}

/// Permanently delete a loan
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Loan ID")),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan changed while deleting")
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.loans.delete_loan(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
