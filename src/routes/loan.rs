//! Loan and installment route definitions

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::handlers::{
    create_loan, delete_loan, edit_loan, get_installment, get_loan, list_loans,
    mark_installment_paid, split_installment,
};
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans", post(create_loan))
        .route("/api/loans", get(list_loans))
        .route("/api/loans/:id", get(get_loan))
        .route("/api/loans/:id", patch(edit_loan))
        .route("/api/loans/:id", delete(delete_loan))
        .route("/api/installments/:id", get(get_installment))
        .route("/api/installments/:id/split", post(split_installment))
        .route("/api/installments/:id/mark-paid", post(mark_installment_paid))
}
