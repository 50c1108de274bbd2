//! Shopping cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Money, ProductId};
use domain::{Cart, Discount};
use serde::{Deserialize, Serialize};
use store::Persistence;

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
}

/// A cart with its derived totals.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: Cart,
    pub total_quantity: u32,
    pub total_amount: Money,
    pub discount_total: Money,
    pub total_with_discount: Money,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            total_quantity: cart.total_quantity(),
            total_amount: cart.total_amount(),
            discount_total: cart.discount_total(),
            total_with_discount: cart.total_with_discount(),
            cart,
        }
    }
}

type CartResult = Result<Json<CartResponse>, ApiError>;

/// GET /cart
pub async fn get<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
) -> CartResult {
    let cart = state.carts.get_cart(&user, &state.request_token()).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items
pub async fn add_item<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> CartResult {
    let cart = state
        .carts
        .add_item(&user, req.product_id, req.quantity, &state.request_token())
        .await?;
    Ok(Json(cart.into()))
}

/// PUT /cart/items/{product_id}
pub async fn update_item<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<ProductId>,
    Json(req): Json<UpdateQuantityRequest>,
) -> CartResult {
    let cart = state
        .carts
        .update_item_quantity(&user, product_id, req.quantity, &state.request_token())
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/items/{product_id}
pub async fn remove_item<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<ProductId>,
) -> CartResult {
    let cart = state
        .carts
        .remove_item(&user, product_id, &state.request_token())
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart
pub async fn clear<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
) -> CartResult {
    let cart = state.carts.clear_cart(&user, &state.request_token()).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/coupon
pub async fn apply_coupon<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ApplyCouponRequest>,
) -> CartResult {
    let cart = state
        .discounts
        .apply_coupon(&user, &req.code, &state.request_token())
        .await?;
    Ok(Json(cart.into()))
}

/// POST /cart/discounts/auto
pub async fn apply_automatic<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
) -> CartResult {
    let cart = state
        .discounts
        .apply_automatic_discounts(&user, &state.request_token())
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/discounts
pub async fn clear_discounts<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
) -> CartResult {
    let cart = state
        .discounts
        .clear_applied_discounts(&user, &state.request_token())
        .await?;
    Ok(Json(cart.into()))
}

/// GET /cart/discounts/applicable
pub async fn applicable_discounts<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Discount>>, ApiError> {
    let discounts = state
        .discounts
        .get_applicable_discounts(&user, &state.request_token())
        .await?;
    Ok(Json(discounts))
}
