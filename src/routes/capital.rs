//! Capital ledger route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{deposit_capital, get_balance, get_capital_history, withdraw_capital};
use crate::state::AppState;

pub fn capital_routes() -> Router<AppState> {
    Router::new()
        .route("/api/capital/:user_id", get(get_balance))
        .route("/api/capital/:user_id/deposits", post(deposit_capital))
        .route("/api/capital/:user_id/withdrawals", post(withdraw_capital))
        .route("/api/capital/:user_id/transactions", get(get_capital_history))
}
