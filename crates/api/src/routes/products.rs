//! Catalog endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use domain::{CategoryRef, NewProduct, Page, Product};
use serde::Deserialize;
use services::StatusChangeAction;
use store::Persistence;

use super::PageQuery;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: BTreeSet<CategoryRef>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            image_url: req.image_url,
            categories: req.categories,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: Money,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    /// Units to add, or remove when negative.
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub action: StatusChangeAction,
}

/// GET /products
pub async fn list<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    let page = state
        .products
        .list_products(query.to_request()?, &state.request_token())
        .await?;
    Ok(Json(page))
}

/// GET /products/{id}
pub async fn get<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .products
        .get_product(id, &state.request_token())
        .await?;
    Ok(Json(product))
}

/// POST /products
pub async fn create<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state
        .products
        .create_product(req.into(), &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/{id}/price
pub async fn update_price<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdatePriceRequest>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .products
        .update_price(id, req.price, &state.request_token())
        .await?;
    Ok(Json(product))
}

/// POST /products/{id}/stock
pub async fn adjust_stock<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<ProductId>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .products
        .adjust_stock(id, req.delta, &state.request_token())
        .await?;
    Ok(Json(product))
}

/// POST /products/{id}/status
pub async fn change_status<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<ProductId>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .products
        .change_status(id, req.action, &state.request_token())
        .await?;
    Ok(Json(product))
}
