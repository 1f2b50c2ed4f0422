//! Identity directory API handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::ApiResponse;
use crate::profile::{ContactLookup, ProfileDirectory};

/// Query parameters for the contact lookup
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub phone: String,
}

/// GET /api/profiles/lookup?phone= - Check whether a contact is registered
pub async fn lookup_contact(
    State(directory): State<ProfileDirectory>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<ApiResponse<ContactLookup>>, ApiError> {
    let lookup = directory.lookup_contact(&query.phone).await?;
    Ok(Json(ApiResponse::ok(lookup)))
}
