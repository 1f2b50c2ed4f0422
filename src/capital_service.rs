//! Capital ledger service - lender working-balance management
//!
//! Every balance mutation runs inside a database transaction that holds a
//! row lock on the account (`SELECT ... FOR UPDATE`), so concurrent debits
//! serialize and cannot both pass the sufficiency check against a stale
//! balance. The scalar balance is the source of truth; the transaction table
//! is the audit trail, written under the same lock.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::capital::{CapitalTransaction, CapitalTransactionKind};
use crate::error::{ApiError, ApiResult};

/// Capital ledger service
#[derive(Clone)]
pub struct CapitalService {
    db_pool: PgPool,
}

impl CapitalService {
    /// Create a new capital service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Current balance for a user. Creates the zero-balance account row on
    /// first access.
    pub async fn get_balance(&self, user_id: Uuid) -> ApiResult<i64> {
        let mut tx = self.db_pool.begin().await?;
        let balance = Self::lock_account(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(balance)
    }

    /// Add capital to a user's pool. Returns the new balance.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        kind: CapitalTransactionKind,
        description: &str,
    ) -> ApiResult<i64> {
        let mut tx = self.db_pool.begin().await?;
        let new_balance = Self::apply_credit(&mut tx, user_id, amount_cents, kind, description).await?;
        tx.commit().await?;
        Ok(new_balance)
    }

    /// Remove capital from a user's pool. Returns the new balance. Fails
    /// when the amount exceeds the current balance.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        kind: CapitalTransactionKind,
        description: &str,
    ) -> ApiResult<i64> {
        let mut tx = self.db_pool.begin().await?;
        let new_balance = Self::apply_debit(&mut tx, user_id, amount_cents, kind, description).await?;
        tx.commit().await?;
        Ok(new_balance)
    }

    /// Debit the principal when a loan is created.
    pub async fn fund_loan(&self, user_id: Uuid, loan_id: Uuid, amount_cents: i64) -> ApiResult<i64> {
        self.debit(
            user_id,
            amount_cents,
            CapitalTransactionKind::LoanFunding,
            &loan_funding_description(loan_id),
        )
        .await
    }

    /// Credit a collected installment payment.
    pub async fn collect_repayment(
        &self,
        user_id: Uuid,
        installment_id: Uuid,
        amount_cents: i64,
    ) -> ApiResult<i64> {
        self.credit(
            user_id,
            amount_cents,
            CapitalTransactionKind::RepaymentCollection,
            &repayment_description(installment_id),
        )
        .await
    }

    /// Transaction history, most recent first.
    pub async fn history(&self, user_id: Uuid, limit: i64) -> ApiResult<Vec<CapitalTransaction>> {
        let limit = limit.clamp(1, 200);
        let transactions = sqlx::query_as::<_, CapitalTransaction>(
            r#"
            SELECT * FROM capital_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(transactions)
    }

    /// Ensure the account row exists and take a row lock on it, returning
    /// the locked balance. The lock is held until the enclosing transaction
    /// commits.
    pub(crate) async fn lock_account(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> ApiResult<i64> {
        sqlx::query("INSERT INTO capital_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        let (balance,): (i64,) =
            sqlx::query_as("SELECT balance_cents FROM capital_accounts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;

        Ok(balance)
    }

    /// Credit inside an existing transaction. Used by the proof workflow and
    /// mark-paid so the ledger movement commits atomically with the
    /// installment update.
    pub(crate) async fn apply_credit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount_cents: i64,
        kind: CapitalTransactionKind,
        description: &str,
    ) -> ApiResult<i64> {
        if amount_cents <= 0 {
            return Err(ApiError::InvalidAmount(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let balance = Self::lock_account(tx, user_id).await?;
        let new_balance = balance + amount_cents;

        Self::write_movement(tx, user_id, new_balance, amount_cents, kind, description).await?;

        Ok(new_balance)
    }

    /// Debit inside an existing transaction. Used by loan creation so the
    /// funding debit commits atomically with the loan and its installments.
    pub(crate) async fn apply_debit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount_cents: i64,
        kind: CapitalTransactionKind,
        description: &str,
    ) -> ApiResult<i64> {
        if amount_cents <= 0 {
            return Err(ApiError::InvalidAmount(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let balance = Self::lock_account(tx, user_id).await?;
        if amount_cents > balance {
            return Err(ApiError::InsufficientCapital(format!(
                "balance is {} cents, requested {} cents",
                balance, amount_cents
            )));
        }
        let new_balance = balance - amount_cents;

        Self::write_movement(tx, user_id, new_balance, amount_cents, kind, description).await?;

        Ok(new_balance)
    }

    /// Persist the new balance and the audit record under the held lock.
    async fn write_movement(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        new_balance: i64,
        amount_cents: i64,
        kind: CapitalTransactionKind,
        description: &str,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE capital_accounts SET balance_cents = $1, updated_at = $2 WHERE user_id = $3")
            .bind(new_balance)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO capital_transactions (id, user_id, kind, amount_cents, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(amount_cents)
        .bind(description)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

/// Audit description for a loan-funding debit.
pub(crate) fn loan_funding_description(loan_id: Uuid) -> String {
    format!("Loan funded (ID: {})", short_id(loan_id))
}

/// Audit description for a repayment-collection credit.
pub(crate) fn repayment_description(installment_id: Uuid) -> String {
    format!("Installment collected (ID: {})", short_id(installment_id))
}

fn short_id(id: Uuid) -> String {
    let s = id.to_string();
    format!("{}...", &s[..8])
}
