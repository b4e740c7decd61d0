//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, stats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblio API",
        version = "0.3.0",
        description = "Library loans and inventory REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::list_active_books,
        books::get_book,
        books::create_book,
        books::disable_book,
        books::restore_book,
        books::delete_book,
        // Loans
        loans::create_loan,
        loans::get_loan,
        loans::list_pending_loans,
        loans::list_loans_by_status,
        loans::list_student_loans,
        loans::confirm_loan,
        loans::reject_loan,
        loans::cancel_loan,
        loans::return_loan,
        loans::delete_loan,
        // Stats
        stats::get_loan_dashboard,
        stats::get_library_counts,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookStatus,
            crate::models::book::CreateBook,
            crate::models::book::BooksByStatus,
            crate::models::id::RecordId,
            // Students
            crate::models::student::Section,
            crate::models::student::SubsectionDetails,
            crate::models::student::StudentDetails,
            // Loans
            crate::models::loan::CreateLoan,
            crate::models::loan::LoanState,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoansByState,
            loans::ConfirmLoanRequest,
            loans::RejectLoanRequest,
            loans::LoanActionResponse,
            // Stats
            stats::LoanDashboard,
            stats::MostLoanedBook,
            stats::MostActiveStudent,
            stats::DashboardResponse,
            stats::LibraryCounts,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "loans", description = "Loan workflow"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
