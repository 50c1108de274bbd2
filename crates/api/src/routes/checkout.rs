//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use services::{CheckoutReceipt, CheckoutRequest};
use store::Persistence;

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

/// POST /checkout
///
/// Pays for the caller's cart and places the order.
pub async fn pay<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let receipt = state
        .payments
        .pay_for_cart(&user, req, &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
