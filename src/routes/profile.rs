//! Identity directory route definitions

use axum::{routing::get, Router};

use crate::handlers::lookup_contact;
use crate::state::AppState;

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/api/profiles/lookup", get(lookup_contact))
}
