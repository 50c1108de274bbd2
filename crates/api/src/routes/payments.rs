//! Payment record endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::PaymentId;
use domain::PaymentRecord;
use serde::Deserialize;
use store::Persistence;

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Gateway reference of the refund.
    pub reference: String,
}

/// GET /payments/{id}
pub async fn get<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<PaymentId>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let record = state
        .payments
        .get_payment(&user, id, &state.request_token())
        .await?;
    Ok(Json(record))
}

/// POST /payments/{id}/refund
pub async fn request_refund<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<PaymentId>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let record = state
        .payments
        .request_refund(id, &req.reference, &state.request_token())
        .await?;
    Ok(Json(record))
}

/// POST /payments/{id}/refund/complete
pub async fn complete_refund<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<PaymentId>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let record = state
        .payments
        .complete_refund(id, &req.reference, &state.request_token())
        .await?;
    Ok(Json(record))
}
