//! Payment-proof workflow - submission and lender review
//!
//! Proof lifecycle per installment: none -> in_review -> approved/rejected,
//! with rejected allowing resubmission and approved being terminal (the
//! installment becomes paid in the same step). Approval credits the lender's
//! capital inside the same database transaction, so "approved" always
//! implies exactly one repayment-collection credit.

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::capital::CapitalTransactionKind;
use crate::capital_service::{repayment_description, CapitalService};
use crate::error::{ApiError, ApiResult};
use crate::loan::{Installment, InstallmentStatus, ProofStatus};
use crate::loan_service::{complete_loan_if_settled, loan_of, lock_installment};
use crate::notifier::{format_soles, Notifier};
use crate::storage::StorageClient;

/// Request to submit a proof image for an installment
#[derive(Debug, Deserialize)]
pub struct SubmitProofRequest {
    pub requester_id: Uuid,
    /// Image bytes, base64-encoded (the mobile client reads the picked
    /// file this way).
    pub image_base64: String,
    /// File extension of the picked image; defaults to jpg.
    pub extension: Option<String>,
}

/// Request body for approve/reject review actions
#[derive(Debug, Deserialize)]
pub struct ReviewProofRequest {
    pub requester_id: Uuid,
}

/// Proof workflow service
#[derive(Clone)]
pub struct ProofService {
    db_pool: PgPool,
    storage: StorageClient,
    notifier: Arc<Notifier>,
}

impl ProofService {
    /// Create a new proof service instance
    pub fn new(db_pool: PgPool, storage: StorageClient, notifier: Arc<Notifier>) -> Self {
        Self {
            db_pool,
            storage,
            notifier,
        }
    }

    /// Borrower submits (or resubmits) a proof image for a pending
    /// installment.
    ///
    /// The previous image, if any, is deleted best-effort. The row update is
    /// conditional on the installment still being submittable, so a
    /// concurrent review cannot be overwritten; if the update loses that
    /// race the freshly uploaded image is removed again.
    pub async fn submit_proof(
        &self,
        installment_id: Uuid,
        request: SubmitProofRequest,
    ) -> ApiResult<Installment> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(request.image_base64.as_bytes())
            .map_err(|e| ApiError::InvalidInput(format!("Invalid base64 image payload: {}", e)))?;
        if bytes.is_empty() {
            return Err(ApiError::InvalidInput("Empty image payload".to_string()));
        }

        let cuota = sqlx::query_as::<_, Installment>("SELECT * FROM installments WHERE id = $1")
            .bind(installment_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Installment {} not found", installment_id)))?;

        let loan = sqlx::query_as::<_, crate::loan::Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(cuota.loan_id)
            .fetch_one(&self.db_pool)
            .await?;

        if loan.borrower_id != request.requester_id {
            return Err(ApiError::Forbidden(
                "Only the borrower can submit a proof for this installment".to_string(),
            ));
        }
        if cuota.status != InstallmentStatus::Pending {
            return Err(ApiError::InvalidState(
                "Installment is already paid".to_string(),
            ));
        }
        if !matches!(cuota.proof_status, ProofStatus::None | ProofStatus::Rejected) {
            return Err(ApiError::InvalidState(
                "A proof is already under review".to_string(),
            ));
        }

        if let Some(previous_url) = cuota.proof_url.as_deref() {
            self.storage.delete(previous_url).await;
        }

        let extension = request.extension.as_deref().unwrap_or("jpg");
        let path = StorageClient::proof_path(installment_id, extension);
        let content_type = format!("image/{}", extension);
        let url = self.storage.upload(&path, bytes, &content_type).await?;

        // Conditional update: only lands while the installment is still in a
        // submittable state
        let updated = sqlx::query_as::<_, Installment>(
            r#"
            UPDATE installments SET
                proof_url = $1,
                proof_status = $2,
                proof_uploaded_at = $3,
                proof_reviewed_at = NULL,
                updated_at = $3
            WHERE id = $4
              AND status = 'pending'
              AND proof_status IN ('none', 'rejected')
            RETURNING *
            "#,
        )
        .bind(&url)
        .bind(ProofStatus::InReview)
        .bind(Utc::now())
        .bind(installment_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(updated) = updated else {
            // Lost a race against a concurrent submit or review; clean up
            // the image we just stored
            self.storage.delete(&url).await;
            return Err(ApiError::Conflict(
                "Installment changed state while uploading the proof".to_string(),
            ));
        };

        tracing::info!(%installment_id, "Proof submitted for review");

        self.notifier
            .notify(
                loan.lender_id,
                "Comprobante recibido",
                &format!(
                    "{} {} subió un comprobante para la cuota #{}",
                    loan.borrower_name,
                    loan.borrower_surname,
                    updated.display_number()
                ),
                serde_json::json!({ "type": "proof_submitted", "installment_id": installment_id }),
            )
            .await;

        Ok(updated)
    }

    /// Lender approves a proof under review: the proof becomes approved, the
    /// installment becomes paid, and the lender's capital is credited - all
    /// in one transaction.
    pub async fn approve(
        &self,
        installment_id: Uuid,
        request: ReviewProofRequest,
    ) -> ApiResult<Installment> {
        let mut tx = self.db_pool.begin().await?;

        let cuota = lock_installment(&mut tx, installment_id).await?;
        let loan = loan_of(&mut tx, cuota.loan_id).await?;

        if loan.lender_id != request.requester_id {
            return Err(ApiError::Forbidden(
                "Only the lender can review this proof".to_string(),
            ));
        }
        if cuota.proof_status != ProofStatus::InReview {
            return Err(ApiError::InvalidState(
                "No proof is under review for this installment".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Installment>(
            r#"
            UPDATE installments SET
                proof_status = $1,
                proof_reviewed_at = $2,
                status = $3,
                paid_at = $2,
                updated_at = $2
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(ProofStatus::Approved)
        .bind(Utc::now())
        .bind(InstallmentStatus::Paid)
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
            amount_cents = updated.amount_cents,
            "Proof approved, installment paid"
        );

        self.notifier
            .notify(
                loan.borrower_id,
                "Pago confirmado",
                &format!(
                    "Tu pago de {} de la cuota #{} fue confirmado",
                    format_soles(updated.amount_cents),
                    updated.display_number()
                ),
                serde_json::json!({ "type": "proof_approved", "installment_id": installment_id }),
            )
            .await;

        Ok(updated)
    }

    /// Lender rejects a proof under review; the installment stays pending
    /// and the borrower may resubmit.
    pub async fn reject(
        &self,
        installment_id: Uuid,
        request: ReviewProofRequest,
    ) -> ApiResult<Installment> {
        let mut tx = self.db_pool.begin().await?;

        let cuota = lock_installment(&mut tx, installment_id).await?;
        let loan = loan_of(&mut tx, cuota.loan_id).await?;

        if loan.lender_id != request.requester_id {
            return Err(ApiError::Forbidden(
                "Only the lender can review this proof".to_string(),
            ));
        }
        if cuota.proof_status != ProofStatus::InReview {
            return Err(ApiError::InvalidState(
                "No proof is under review for this installment".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Installment>(
            r#"
            UPDATE installments SET
                proof_status = $1,
                proof_reviewed_at = $2,
                updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(ProofStatus::Rejected)
        .bind(Utc::now())
        .bind(installment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%installment_id, "Proof rejected");

        self.notifier
            .notify(
                loan.borrower_id,
                "Comprobante rechazado",
                &format!(
                    "El comprobante de tu cuota #{} fue rechazado, puedes subir uno nuevo",
                    updated.display_number()
                ),
                serde_json::json!({ "type": "proof_rejected", "installment_id": installment_id }),
            )
            .await;

        Ok(updated)
    }
}
