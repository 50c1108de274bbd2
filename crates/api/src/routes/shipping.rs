//! Shipping quote endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use services::ShippingEstimate;
use store::Persistence;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /shipping/estimate/{postal_code}
pub async fn estimate<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(postal_code): Path<String>,
) -> Result<Json<ShippingEstimate>, ApiError> {
    let estimate = state
        .shipping
        .estimate(&postal_code, &state.request_token())
        .await?;
    Ok(Json(estimate))
}
