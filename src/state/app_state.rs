//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::capital_service::CapitalService;
use crate::loan_service::LoanService;
use crate::profile::ProfileDirectory;
use crate::proof_service::ProofService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub loan_service: Arc<LoanService>,
    pub capital_service: Arc<CapitalService>,
    pub proof_service: Arc<ProofService>,
    pub directory: ProfileDirectory,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        loan_service: Arc<LoanService>,
        capital_service: Arc<CapitalService>,
        proof_service: Arc<ProofService>,
        directory: ProfileDirectory,
    ) -> Self {
        Self {
            db_pool,
            loan_service,
            capital_service,
            proof_service,
            directory,
        }
    }
}

impl FromRef<AppState> for Arc<LoanService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for Arc<CapitalService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.capital_service.clone()
    }
}

impl FromRef<AppState> for Arc<ProofService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.proof_service.clone()
    }
}

impl FromRef<AppState> for ProfileDirectory {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
