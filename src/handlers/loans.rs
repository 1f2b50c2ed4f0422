//! Loan and installment API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::ApiResponse;
use crate::loan::{
    CreateLoanRequest, DeleteLoanRequest, Installment, ListLoansQuery, Loan, LoanSummary,
    MarkPaidRequest, SplitInstallmentRequest, SplitInstallmentResponse, UpdateLoanRequest,
};
use crate::loan_service::LoanService;

/// POST /api/loans - Create a loan to a registered contact
pub async fn create_loan(
    State(loan_service): State<Arc<LoanService>>,
    Json(request): Json<CreateLoanRequest>,
) -> Result<Json<ApiResponse<Loan>>, ApiError> {
    let loan = loan_service.create_loan(request).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

/// GET /api/loans?lender_id=|borrower_id= - List loans for one side
pub async fn list_loans(
    State(loan_service): State<Arc<LoanService>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<ApiResponse<Vec<LoanSummary>>>, ApiError> {
    let loans = loan_service.list_loans(query).await?;
    Ok(Json(ApiResponse::ok(loans)))
}

/// GET /api/loans/:id - Loan detail with installments and lender profile
pub async fn get_loan(
    State(loan_service): State<Arc<LoanService>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanSummary>>, ApiError> {
    let detail = loan_service.get_detail(loan_id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// PATCH /api/loans/:id - Edit borrower snapshot fields and interest rate
pub async fn edit_loan(
    State(loan_service): State<Arc<LoanService>>,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<UpdateLoanRequest>,
) -> Result<Json<ApiResponse<Loan>>, ApiError> {
    let loan = loan_service.edit_loan(loan_id, request).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

/// DELETE /api/loans/:id - Delete a loan without paid installments
pub async fn delete_loan(
    State(loan_service): State<Arc<LoanService>>,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<DeleteLoanRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    loan_service.delete_loan(loan_id, request).await?;
    Ok(Json(ApiResponse::ok(())))
}

/// GET /api/installments/:id - Installment detail, proof fields included
pub async fn get_installment(
    State(loan_service): State<Arc<LoanService>>,
    Path(installment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Installment>>, ApiError> {
    let cuota = loan_service.get_installment(installment_id).await?;
    Ok(Json(ApiResponse::ok(cuota)))
}

/// POST /api/installments/:id/split - Split a pending installment
pub async fn split_installment(
    State(loan_service): State<Arc<LoanService>>,
    Path(installment_id): Path<Uuid>,
    Json(request): Json<SplitInstallmentRequest>,
) -> Result<Json<ApiResponse<SplitInstallmentResponse>>, ApiError> {
    let result = loan_service.split_installment(installment_id, request).await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/installments/:id/mark-paid - Lender's direct mark-paid bypass
pub async fn mark_installment_paid(
    State(loan_service): State<Arc<LoanService>>,
    Path(installment_id): Path<Uuid>,
    Json(request): Json<MarkPaidRequest>,
) -> Result<Json<ApiResponse<Installment>>, ApiError> {
    let cuota = loan_service.mark_paid(installment_id, request).await?;
    Ok(Json(ApiResponse::ok(cuota)))
}
