//! Capital ledger API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::capital::{
    BalanceResponse, CapitalMovementRequest, CapitalTransaction, CapitalTransactionKind,
    HistoryQuery,
};
use crate::capital_service::CapitalService;
use crate::error::ApiError;
use crate::handlers::ApiResponse;

/// GET /api/capital/:user_id - Current balance (zero on first access)
pub async fn get_balance(
    State(capital_service): State<Arc<CapitalService>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BalanceResponse>>, ApiError> {
    let balance_cents = capital_service.get_balance(user_id).await?;
    Ok(Json(ApiResponse::ok(BalanceResponse {
        user_id,
        balance_cents,
    })))
}

/// POST /api/capital/:user_id/deposits - Add capital to the pool
pub async fn deposit_capital(
    State(capital_service): State<Arc<CapitalService>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<CapitalMovementRequest>,
) -> Result<Json<ApiResponse<BalanceResponse>>, ApiError> {
    request.validate()?;
    let description = request
        .description
        .unwrap_or_else(|| "Capital deposit".to_string());
    let balance_cents = capital_service
        .credit(
            user_id,
            request.amount_cents,
            CapitalTransactionKind::Inflow,
            &description,
        )
        .await?;
    Ok(Json(ApiResponse::ok(BalanceResponse {
        user_id,
        balance_cents,
    })))
}

/// POST /api/capital/:user_id/withdrawals - Withdraw available capital
pub async fn withdraw_capital(
    State(capital_service): State<Arc<CapitalService>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<CapitalMovementRequest>,
) -> Result<Json<ApiResponse<BalanceResponse>>, ApiError> {
    request.validate()?;
    let description = request
        .description
        .unwrap_or_else(|| "Capital withdrawal".to_string());
    let balance_cents = capital_service
        .debit(
            user_id,
            request.amount_cents,
            CapitalTransactionKind::Outflow,
            &description,
        )
        .await?;
    Ok(Json(ApiResponse::ok(BalanceResponse {
        user_id,
        balance_cents,
    })))
}

/// GET /api/capital/:user_id/transactions - Audit trail, most recent first
pub async fn get_capital_history(
    State(capital_service): State<Arc<CapitalService>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<CapitalTransaction>>>, ApiError> {
    let transactions = capital_service
        .history(user_id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(ApiResponse::ok(transactions)))
}
