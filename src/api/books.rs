//! Book catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, BookStatus, BooksByStatus, CreateBook},
    AppState,
};

use super::AuthenticatedUser;

/// List all books, partitioned by status
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Books by status", body = BooksByStatus),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<BooksByStatus>> {
    Ok(Json(state.services.catalog.list_books().await?))
}

/// List books available for loan
#[utoipa::path(
    get,
    path = "/books/active",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active books", body = Vec<Book>)
    )
)]
pub async fn list_active_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(state.services.catalog.list_active().await?))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 400, description = "Malformed identifier"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    Ok(Json(state.services.catalog.get_book(&id).await?))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_admin()?;

    let book = state.services.catalog.create_book(data).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Take a book out of circulation
#[utoipa::path(
    patch,
    path = "/books/{id}/disable",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book disabled", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn disable_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    claims.require_admin()?;
    Ok(Json(state.services.catalog.set_status(&id, BookStatus::Inactive).await?))
}

/// Put a disabled or deleted book back into circulation
#[utoipa::path(
    patch,
    path = "/books/{id}/restore",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book restored", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn restore_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    claims.require_admin()?;
    Ok(Json(state.services.catalog.set_status(&id, BookStatus::Active).await?))
}

/// Soft-delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book marked deleted", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    claims.require_admin()?;
    Ok(Json(state.services.catalog.set_status(&id, BookStatus::Deleted).await?))
}
