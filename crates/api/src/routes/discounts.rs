//! Discount administration endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CategoryId, DiscountId, Money};
use domain::{Discount, DiscountFilter, DiscountType, NewDiscount, Page};
use rust_decimal::Decimal;
use serde::Deserialize;
use store::Persistence;

use super::PageQuery;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDiscountRequest {
    /// Coupon code; automatic discounts may omit it.
    pub code: Option<String>,
    pub discount_type: DiscountType,
    pub fixed_amount: Option<Money>,
    pub percentage: Option<Decimal>,
    pub max_uses: u32,
    pub min_order_amount: Money,
    pub max_uses_per_user: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[serde(default)]
    pub auto_apply: bool,
    #[serde(default)]
    pub categories: BTreeSet<CategoryId>,
}

impl From<CreateDiscountRequest> for NewDiscount {
    fn from(req: CreateDiscountRequest) -> Self {
        NewDiscount {
            code: req.code,
            discount_type: req.discount_type,
            fixed_amount: req.fixed_amount,
            percentage: req.percentage,
            max_uses: req.max_uses,
            min_order_amount: req.min_order_amount,
            max_uses_per_user: req.max_uses_per_user,
            valid_from: req.valid_from,
            valid_to: req.valid_to,
            auto_apply: req.auto_apply,
            categories: req.categories,
        }
    }
}

/// Filter and paging for `GET /discounts`.
#[derive(Debug, Default, Deserialize)]
pub struct ListDiscountsQuery {
    pub is_active: Option<bool>,
    pub discount_type: Option<DiscountType>,
    pub auto_apply: Option<bool>,
    pub code: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListDiscountsQuery {
    fn filter(&self) -> DiscountFilter {
        DiscountFilter {
            is_active: self.is_active,
            discount_type: self.discount_type,
            auto_apply: self.auto_apply,
            code: self.code.clone(),
        }
    }

    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// GET /discounts
pub async fn list<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Query(query): Query<ListDiscountsQuery>,
) -> Result<Json<Page<Discount>>, ApiError> {
    let page = state
        .discounts
        .list_discounts(
            &query.filter(),
            query.page().to_request()?,
            &state.request_token(),
        )
        .await?;
    Ok(Json(page))
}

/// GET /discounts/{id}
pub async fn get<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<DiscountId>,
) -> Result<Json<Discount>, ApiError> {
    let discount = state
        .discounts
        .get_discount(id, &state.request_token())
        .await?;
    Ok(Json(discount))
}

/// POST /discounts
pub async fn create<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Json(req): Json<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<Discount>), ApiError> {
    let discount = state
        .discounts
        .create_discount(req.into(), &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(discount)))
}

/// POST /discounts/{id}/deactivate
pub async fn deactivate<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<DiscountId>,
) -> Result<Json<Discount>, ApiError> {
    let discount = state
        .discounts
        .deactivate(id, &state.request_token())
        .await?;
    Ok(Json(discount))
}

/// DELETE /discounts/{id}
///
/// Only discounts that were never used can be deleted.
pub async fn delete<P: Persistence>(
    State(state): State<Arc<AppState<P>>>,
    Path(id): Path<DiscountId>,
) -> Result<StatusCode, ApiError> {
    state
        .discounts
        .delete_discount(id, &state.request_token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
