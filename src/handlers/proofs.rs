//! Payment-proof API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::ApiResponse;
use crate::loan::Installment;
use crate::proof_service::{ProofService, ReviewProofRequest, SubmitProofRequest};

/// POST /api/installments/:id/proof - Borrower submits a proof image
pub async fn submit_proof(
    State(proof_service): State<Arc<ProofService>>,
    Path(installment_id): Path<Uuid>,
    Json(request): Json<SubmitProofRequest>,
) -> Result<Json<ApiResponse<Installment>>, ApiError> {
    let cuota = proof_service.submit_proof(installment_id, request).await?;
    Ok(Json(ApiResponse::ok(cuota)))
}

/// POST /api/installments/:id/proof/approve - Lender approves the proof
pub async fn approve_proof(
    State(proof_service): State<Arc<ProofService>>,
    Path(installment_id): Path<Uuid>,
    Json(request): Json<ReviewProofRequest>,
) -> Result<Json<ApiResponse<Installment>>, ApiError> {
    let cuota = proof_service.approve(installment_id, request).await?;
    Ok(Json(ApiResponse::ok(cuota)))
}

/// POST /api/installments/:id/proof/reject - Lender rejects the proof
pub async fn reject_proof(
    State(proof_service): State<Arc<ProofService>>,
    Path(installment_id): Path<Uuid>,
    Json(request): Json<ReviewProofRequest>,
) -> Result<Json<ApiResponse<Installment>>, ApiError> {
    let cuota = proof_service.reject(installment_id, request).await?;
    Ok(Json(ApiResponse::ok(cuota)))
}
