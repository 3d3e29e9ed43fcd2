//! Business logic services

pub mod accounts;
pub mod borrows;
pub mod catalog;

use chrono::Duration;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowService,
    pub accounts: accounts::AccountsService,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            borrows: borrows::BorrowService::new(
                repository.clone(),
                Duration::days(config.loans.period_days),
            ),
            accounts: accounts::AccountsService::new(repository, config.auth.clone()),
        }
    }
}
