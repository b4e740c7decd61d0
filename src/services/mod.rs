//! Business logic services

pub mod catalog;
pub mod inventory;
pub mod loans;
pub mod stats;

use crate::{config::LoanPolicy, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services over one repository. The inventory ledger is
    /// shared so every loan path contends on the same per-book locks.
    pub fn new(repository: Repository, policy: LoanPolicy) -> Self {
        let ledger = inventory::InventoryLedger::new(repository.books.clone());
        let loans = loans::LoansService::new(repository.clone(), ledger, policy);

        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            stats: stats::StatsService::new(repository, loans.clone()),
            loans,
        }
    }
}
