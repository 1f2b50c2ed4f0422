//! Payment-proof route definitions

use axum::{routing::post, Router};

use crate::handlers::{approve_proof, reject_proof, submit_proof};
use crate::state::AppState;

pub fn proof_routes() -> Router<AppState> {
    Router::new()
        .route("/api/installments/:id/proof", post(submit_proof))
        .route("/api/installments/:id/proof/approve", post(approve_proof))
        .route("/api/installments/:id/proof/reject", post(reject_proof))
}
