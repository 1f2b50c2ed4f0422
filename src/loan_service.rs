//! Loan service layer - lifecycle, listings, partial-payment splits
//!
//! Creation debits the lender's capital and persists the loan plus its
//! installment schedule in one database transaction, so a failure anywhere
//! rolls the funding debit back. Mutations on individual installments lock
//! the installment row for the duration of the transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::capital::CapitalTransactionKind;
use crate::capital_service::{loan_funding_description, repayment_description, CapitalService};
use crate::error::{ApiError, ApiResult};
use crate::loan::{
    CreateLoanRequest, DeleteLoanRequest, Installment, InstallmentStatus, LenderInfo, ListLoansQuery,
    Loan, LoanStatus, LoanSummary, MarkPaidRequest, SplitInstallmentRequest,
    SplitInstallmentResponse, UpdateLoanRequest,
};
use crate::notifier::{format_soles, Notifier};
use crate::phone::normalize_phone;
use crate::profile::ProfileDirectory;
use crate::schedule::{generate_schedule, installment_amount_cents, total_amount_cents};

/// Smallest amount an installment may hold after a split, in cents
/// (10 soles).
pub const MIN_INSTALLMENT_CENTS: i64 = 1_000;

/// Loan service for managing loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    db_pool: PgPool,
    directory: ProfileDirectory,
    notifier: Arc<Notifier>,
}

impl LoanService {
    /// Create a new loan service instance
    pub fn new(db_pool: PgPool, directory: ProfileDirectory, notifier: Arc<Notifier>) -> Self {
        Self {
            db_pool,
            directory,
            notifier,
        }
    }

    /// Create a loan to a registered contact.
    ///
    /// The borrower must resolve in the identity directory and the lender
    /// must hold at least the principal in capital. Funding debit, loan row
    /// and installment rows commit atomically; the borrower notification is
    /// fired after commit, best-effort.
    pub async fn create_loan(&self, request: CreateLoanRequest) -> ApiResult<Loan> {
        request.validate()?;

        let normalized_phone = normalize_phone(&request.borrower.phone);
        if normalized_phone.is_empty() {
            return Err(ApiError::InvalidPhone(format!(
                "'{}' is not a valid phone number",
                request.borrower.phone
            )));
        }

        let borrower = self
            .directory
            .resolve_by_phone(&normalized_phone)
            .await?
            .ok_or_else(|| {
                ApiError::BorrowerNotRegistered(
                    "This contact does not have an account yet".to_string(),
                )
            })?;

        let total_cents = total_amount_cents(request.principal_cents, request.interest_rate_bps);
        let per_installment_cents = installment_amount_cents(total_cents, request.installment_count);
        let start_date = request
            .start_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let schedule = generate_schedule(
            request.installment_count,
            per_installment_cents,
            request.payment_frequency,
            start_date,
        );

        let loan_id = Uuid::new_v4();
        let mut tx = self.db_pool.begin().await?;

        // Funding debit first: an underfunded lender aborts before any loan
        // row exists.
        CapitalService::apply_debit(
            &mut tx,
            request.lender_id,
            request.principal_cents,
            CapitalTransactionKind::LoanFunding,
            &loan_funding_description(loan_id),
        )
        .await?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                id, lender_id, borrower_id,
                borrower_name, borrower_surname, borrower_phone, borrower_email,
                principal_cents, interest_rate_bps, installment_count,
                payment_frequency, installment_amount_cents, total_amount_cents,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(request.lender_id)
        .bind(borrower.user_id)
        .bind(&request.borrower.name)
        .bind(&request.borrower.surname)
        .bind(&normalized_phone)
        .bind(&request.borrower.email)
        .bind(request.principal_cents)
        .bind(request.interest_rate_bps)
        .bind(request.installment_count)
        .bind(request.payment_frequency)
        .bind(per_installment_cents)
        .bind(total_cents)
        .bind(LoanStatus::Active)
        .bind(Utc::now())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for cuota in &schedule {
            sqlx::query(
                r#"
                INSERT INTO installments (
                    id, loan_id, sequence_number, split_seq, amount_cents,
                    due_date, status, created_at, updated_at
                )
                VALUES ($1, $2, $3, 0, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(loan_id)
            .bind(cuota.sequence_number)
            .bind(cuota.amount_cents)
            .bind(cuota.due_date)
            .bind(InstallmentStatus::Pending)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            lender_id = %loan.lender_id,
            borrower_id = %loan.borrower_id,
            total_cents,
            "Loan created"
        );

        // Borrower-facing notification, off the request path
        let notifier = self.notifier.clone();
        let directory = self.directory.clone();
        let notify_loan = loan.clone();
        tokio::spawn(async move {
            let lender_name = match directory.get_profile(notify_loan.lender_id).await {
                Ok(Some(profile)) => profile.name,
                _ => "Un contacto".to_string(),
            };
            let body = format!(
                "{} te registró un préstamo de {} en {} cuotas",
                lender_name,
                format_soles(notify_loan.total_amount_cents),
                notify_loan.installment_count
            );
            notifier
                .notify(
                    notify_loan.borrower_id,
                    "Nuevo préstamo",
                    &body,
                    serde_json::json!({ "type": "loan_created", "loan_id": notify_loan.id }),
                )
                .await;
        });

        Ok(loan)
    }

    /// Loans where the given user is lender or borrower, newest first, with
    /// installments and repayment aggregates attached.
    pub async fn list_loans(&self, query: ListLoansQuery) -> ApiResult<Vec<LoanSummary>> {
        let (column, user_id, attach_lender) = match (query.lender_id, query.borrower_id) {
            (Some(id), None) => ("lender_id", id, false),
            (None, Some(id)) => ("borrower_id", id, true),
            _ => {
                return Err(ApiError::InvalidInput(
                    "Provide exactly one of lender_id or borrower_id".to_string(),
                ))
            }
        };

        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT * FROM loans WHERE {} = $1 ORDER BY created_at DESC",
            column
        ))
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        let loan_ids: Vec<Uuid> = loans.iter().map(|l| l.id).collect();
        let installments = sqlx::query_as::<_, Installment>(
            r#"
            SELECT * FROM installments
            WHERE loan_id = ANY($1)
            ORDER BY sequence_number, split_seq
            "#,
        )
        .bind(&loan_ids)
        .fetch_all(&self.db_pool)
        .await?;

        let mut by_loan: HashMap<Uuid, Vec<Installment>> = HashMap::new();
        for cuota in installments {
            by_loan.entry(cuota.loan_id).or_default().push(cuota);
        }

        // Borrower-side listings also show who the lender is
        let mut lenders: HashMap<Uuid, LenderInfo> = HashMap::new();
        if attach_lender {
            let lender_ids: Vec<Uuid> = loans.iter().map(|l| l.lender_id).collect();
            let profiles = sqlx::query_as::<_, crate::profile::Profile>(
                "SELECT user_id, name, surname, phone, email, push_token FROM profiles WHERE user_id = ANY($1)",
            )
            .bind(&lender_ids)
            .fetch_all(&self.db_pool)
            .await?;
            for p in profiles {
                lenders.insert(
                    p.user_id,
                    LenderInfo {
                        name: p.name,
                        surname: p.surname,
                        phone: p.phone,
                        email: p.email,
                    },
                );
            }
        }

        let summaries = loans
            .into_iter()
            .map(|loan| {
                let cuotas = by_loan.remove(&loan.id).unwrap_or_default();
                let lender = attach_lender
                    .then(|| lenders.get(&loan.lender_id).cloned())
                    .flatten();
                summarize(loan, cuotas, lender)
            })
            .collect();

        Ok(summaries)
    }

    /// Single loan with its installments and the lender's profile.
    pub async fn get_detail(&self, loan_id: Uuid) -> ApiResult<LoanSummary> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", loan_id)))?;

        let installments = sqlx::query_as::<_, Installment>(
            "SELECT * FROM installments WHERE loan_id = $1 ORDER BY sequence_number, split_seq",
        )
        .bind(loan_id)
        .fetch_all(&self.db_pool)
        .await?;

        let lender = self
            .directory
            .get_profile(loan.lender_id)
            .await?
            .map(|p| LenderInfo {
                name: p.name,
                surname: p.surname,
                phone: p.phone,
                email: p.email,
            });

        Ok(summarize(loan, installments, lender))
    }

    /// Fetch a single installment.
    pub async fn get_installment(&self, installment_id: Uuid) -> ApiResult<Installment> {
        sqlx::query_as::<_, Installment>("SELECT * FROM installments WHERE id = $1")
            .bind(installment_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Installment {} not found", installment_id)))
    }

    /// Edit a loan's borrower snapshot and interest rate. Lender only.
    /// Principal, installment count and frequency are immutable; the patch
    /// type cannot even carry them.
    pub async fn edit_loan(&self, loan_id: Uuid, request: UpdateLoanRequest) -> ApiResult<Loan> {
        request.validate()?;

        if request.is_empty() {
            return Err(ApiError::InvalidInput("Patch carries no fields".to_string()));
        }

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", loan_id)))?;

        if loan.lender_id != request.requester_id {
            return Err(ApiError::Forbidden(
                "Only the lender can edit this loan".to_string(),
            ));
        }

        // A phone patch is normalized before it lands in the snapshot
        let borrower_phone = match request.borrower_phone.as_deref() {
            Some(raw) => {
                let normalized = normalize_phone(raw);
                if normalized.is_empty() {
                    return Err(ApiError::InvalidPhone(format!(
                        "'{}' is not a valid phone number",
                        raw
                    )));
                }
                Some(normalized)
            }
            None => None,
        };

        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET
                borrower_name = COALESCE($1, borrower_name),
                borrower_surname = COALESCE($2, borrower_surname),
                borrower_phone = COALESCE($3, borrower_phone),
                borrower_email = COALESCE($4, borrower_email),
                interest_rate_bps = COALESCE($5, interest_rate_bps),
                updated_at = $6
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&request.borrower_name)
        .bind(&request.borrower_surname)
        .bind(&borrower_phone)
        .bind(&request.borrower_email)
        .bind(request.interest_rate_bps)
        .bind(Utc::now())
        .bind(loan_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(updated)
    }

    /// Delete a loan and all its installments. Lender only, and only while
    /// no installment has been paid.
    pub async fn delete_loan(&self, loan_id: Uuid, request: DeleteLoanRequest) -> ApiResult<()> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", loan_id)))?;

        if loan.lender_id != request.requester_id {
            return Err(ApiError::Forbidden(
                "Only the lender can delete this loan".to_string(),
            ));
        }

        let (paid_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM installments WHERE loan_id = $1 AND status = 'paid'",
        )
        .bind(loan_id)
        .fetch_one(&self.db_pool)
        .await?;

        if paid_count > 0 {
            return Err(ApiError::HasPaidInstallments(
                "A loan with paid installments cannot be deleted".to_string(),
            ));
        }

        // Installments first; the store enforces the foreign key
        let mut tx = self.db_pool.begin().await?;
        sqlx::query("DELETE FROM installments WHERE loan_id = $1")
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(%loan_id, "Loan deleted");

        Ok(())
    }

    /// Lender's direct mark-as-paid bypass: no proof review involved. The
    /// installment flips to paid and the lender's capital is credited in the
    /// same transaction.
    pub async fn mark_paid(
        &self,
        installment_id: Uuid,
        request: MarkPaidRequest,
    ) -> ApiResult<Installment> {
        let mut tx = self.db_pool.begin().await?;

        let cuota = lock_installment(&mut tx, installment_id).await?;
        let loan = loan_of(&mut tx, cuota.loan_id).await?;

        if loan.lender_id != request.requester_id {
            return Err(ApiError::Forbidden(
                "Only the lender can mark this installment as paid".to_string(),
            ));
        }
        if cuota.status != InstallmentStatus::Pending {
            return Err(ApiError::InvalidState(
                "Installment is already paid".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Installment>(
            r#"
            UPDATE installments SET
                status = $1,
                paid_at = $2,
                proof_url = COALESCE($3, proof_url),
                updated_at = $2
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(InstallmentStatus::Paid)
        .bind(Utc::now())
        .bind(&request.proof_url)
        .bind(installment_id)
        .fetch_one(&mut *tx)
        .await?;

        CapitalService::apply_credit(
            &mut tx,
            loan.lender_id,
            updated.amount_cents,
            CapitalTransactionKind::RepaymentCollection,
            &repayment_description(installment_id),
        )
        .await?;

        complete_loan_if_settled(&mut tx, loan.id).await?;

        tx.commit().await?;

        tracing::info!(
            %installment_id,
            loan_id = %loan.id,
            amount_cents = updated.amount_cents,
            "Installment marked paid"
        );

        self.notifier
            .notify(
                loan.borrower_id,
                "Pago registrado",
                &format!(
                    "Tu cuota #{} de {} fue registrada como pagada",
                    updated.display_number(),
                    format_soles(updated.amount_cents)
                ),
                serde_json::json!({ "type": "installment_paid", "installment_id": installment_id }),
            )
            .await;

        Ok(updated)
    }

    /// Split a pending installment into a partial payment and a remainder
    /// child.
    ///
    /// The parent keeps its id and due date but shrinks to the partial
    /// amount; the child carries the remainder under the next free
    /// `(sequence_number, split_seq)` slot. Total owed is conserved.
    pub async fn split_installment(
        &self,
        installment_id: Uuid,
        request: SplitInstallmentRequest,
    ) -> ApiResult<SplitInstallmentResponse> {
        request.validate()?;
        let partial = request.partial_amount_cents;

        let mut tx = self.db_pool.begin().await?;

        let cuota = lock_installment(&mut tx, installment_id).await?;
        let loan = loan_of(&mut tx, cuota.loan_id).await?;

        if loan.lender_id != request.requester_id {
            return Err(ApiError::Forbidden(
                "Only the lender can split this installment".to_string(),
            ));
        }
        if cuota.status != InstallmentStatus::Pending {
            return Err(ApiError::InvalidState(
                "Only pending installments can be split".to_string(),
            ));
        }
        if partial <= 0 || partial >= cuota.amount_cents {
            return Err(ApiError::InvalidAmount(
                "Partial amount must be greater than 0 and below the installment amount"
                    .to_string(),
            ));
        }

        let remainder = cuota.amount_cents - partial;
        if remainder < MIN_INSTALLMENT_CENTS {
            return Err(ApiError::RemainderTooSmall(format!(
                "remainder {} is below the {} minimum",
                format_soles(remainder),
                format_soles(MIN_INSTALLMENT_CENTS)
            )));
        }

        let parent = sqlx::query_as::<_, Installment>(
            "UPDATE installments SET amount_cents = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(partial)
        .bind(Utc::now())
        .bind(installment_id)
        .fetch_one(&mut *tx)
        .await?;

        // Next free slot under this sequence number keeps children sortable
        // even across repeated splits
        let (max_split,): (i32,) = sqlx::query_as(
            r#"
            SELECT COALESCE(MAX(split_seq), 0) FROM installments
            WHERE loan_id = $1 AND sequence_number = $2
            "#,
        )
        .bind(cuota.loan_id)
        .bind(cuota.sequence_number)
        .fetch_one(&mut *tx)
        .await?;

        let child = sqlx::query_as::<_, Installment>(
            r#"
            INSERT INTO installments (
                id, loan_id, sequence_number, split_seq, amount_cents, due_date,
                status, parent_installment_id, is_partial_payment, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cuota.loan_id)
        .bind(cuota.sequence_number)
        .bind(max_split + 1)
        .bind(remainder)
        .bind(cuota.due_date)
        .bind(InstallmentStatus::Pending)
        .bind(installment_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            %installment_id,
            child_id = %child.id,
            partial_cents = partial,
            remainder_cents = remainder,
            "Installment split"
        );

        Ok(SplitInstallmentResponse { parent, child })
    }
}

/// Fetch an installment and lock its row for the rest of the transaction.
pub(crate) async fn lock_installment(
    tx: &mut Transaction<'_, Postgres>,
    installment_id: Uuid,
) -> ApiResult<Installment> {
    sqlx::query_as::<_, Installment>("SELECT * FROM installments WHERE id = $1 FOR UPDATE")
        .bind(installment_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Installment {} not found", installment_id)))
}

/// Fetch the loan owning an installment, inside the caller's transaction.
pub(crate) async fn loan_of(tx: &mut Transaction<'_, Postgres>, loan_id: Uuid) -> ApiResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
        .bind(loan_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(ApiError::from)
}

/// Flip the loan to completed when no pending installment remains. Returns
/// whether the loan completed.
pub(crate) async fn complete_loan_if_settled(
    tx: &mut Transaction<'_, Postgres>,
    loan_id: Uuid,
) -> ApiResult<bool> {
    let (pending,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM installments WHERE loan_id = $1 AND status = 'pending'",
    )
    .bind(loan_id)
    .fetch_one(&mut **tx)
    .await?;

    if pending > 0 {
        return Ok(false);
    }

    sqlx::query("UPDATE loans SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(LoanStatus::Completed)
        .bind(Utc::now())
        .bind(loan_id)
        .execute(&mut **tx)
        .await?;

    tracing::info!(%loan_id, "Loan completed");
    Ok(true)
}

/// Attach repayment aggregates to a loan, as the list screens display them.
fn summarize(loan: Loan, installments: Vec<Installment>, lender: Option<LenderInfo>) -> LoanSummary {
    let paid: Vec<_> = installments
        .iter()
        .filter(|c| c.status == InstallmentStatus::Paid)
        .collect();
    let paid_installments = paid.len() as i64;
    let paid_amount_cents: i64 = paid.iter().map(|c| c.amount_cents).sum();
    let outstanding_amount_cents = loan.total_amount_cents - paid_amount_cents;

    LoanSummary {
        loan,
        installments,
        paid_installments,
        paid_amount_cents,
        outstanding_amount_cents,
        lender,
    }
}
