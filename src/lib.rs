//! Biblio Library Loans Server
//!
//! REST JSON API over a school library's book catalog and its loan
//! workflow: students request loans, admins confirm, reject or close them,
//! and every confirm and return moves the book's available quantity.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::Repository) -> Self {
        let services = services::Services::new(repository, config.loans.clone());
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
