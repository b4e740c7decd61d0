//! API handlers for Biblio REST endpoints

pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod stats;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::CorsConfig, error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Authentication("Invalid authorization header format".to_string())
        })?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books (catalog)
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/active", get(books::list_active_books))
        .route("/books/:id", get(books::get_book).delete(books::delete_book))
        .route("/books/:id/disable", patch(books::disable_book))
        .route("/books/:id/restore", patch(books::restore_book))
        // Loans
        .route("/loans", post(loans::create_loan))
        .route("/loans/pending", get(loans::list_pending_loans))
        .route("/loans/status/:state", get(loans::list_loans_by_status))
        .route("/loans/student/:id", get(loans::list_student_loans))
        .route("/loans/:id", get(loans::get_loan).delete(loans::delete_loan))
        .route("/loans/:id/confirm", put(loans::confirm_loan))
        .route("/loans/:id/reject", put(loans::reject_loan))
        .route("/loans/:id/cancel", put(loans::cancel_loan))
        .route("/loans/:id/return", put(loans::return_loan))
        // Statistics
        .route("/stats/loans/dashboard", get(stats::get_loan_dashboard))
        .route("/stats/library", get(stats::get_library_counts))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allowed_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
