//! Capital (working balance) models for the PrestAmigo backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Why a capital movement happened
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "capital_transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CapitalTransactionKind {
    /// Lender deposits fresh capital into the pool
    Inflow,
    /// Lender withdraws capital from the pool
    Outflow,
    /// Principal advanced when a loan is created
    LoanFunding,
    /// Installment payment collected back into the pool
    RepaymentCollection,
}

/// One lender's running capital balance
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct CapitalAccount {
    pub user_id: Uuid,
    pub balance_cents: i64,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit record for a balance movement
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct CapitalTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: CapitalTransactionKind,
    pub amount_cents: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for deposits and withdrawals
#[derive(Debug, Deserialize, Validate)]
pub struct CapitalMovementRequest {
    #[validate(range(min = 1))]
    pub amount_cents: i64,
    pub description: Option<String>,
}

/// Balance after a movement (or on read)
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance_cents: i64,
}

/// Query parameters for the transaction history listing
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}
