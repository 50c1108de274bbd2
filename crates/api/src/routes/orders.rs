//! Order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::OrderId;
use domain::{DiscountHistory, Order, Page, PaymentRecord};
use store::Persistence;

use super::PageQuery;
use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

/// GET /orders
pub async fn list<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Order>>, ApiError> {
    let page = state
        .orders
        .list_orders_for_user(&user, query.to_request()?, &state.request_token())
        .await?;
    Ok(Json(page))
}

/// GET /orders/{id}
pub async fn get<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .get_order(&user, id, &state.request_token())
        .await?;
    Ok(Json(order))
}

/// GET /orders/{id}/discounts
pub async fn discounts<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<DiscountHistory>>, ApiError> {
    let cancel = state.request_token();
    state.orders.get_order(&user, id, &cancel).await?;
    let history = state.discounts.get_history_by_order(id, &cancel).await?;
    Ok(Json(history))
}

/// GET /orders/{id}/payments
pub async fn payments<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<PaymentRecord>>, ApiError> {
    let records = state
        .payments
        .get_payments_for_order(&user, id, &state.request_token())
        .await?;
    Ok(Json(records))
}

/// POST /orders/{id}/cancel
pub async fn cancel<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .cancel_order(&user, id, &state.request_token())
        .await?;
    Ok(Json(order))
}
