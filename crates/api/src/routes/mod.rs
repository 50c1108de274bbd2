//! HTTP handlers, one module per resource.

pub mod cart;
pub mod checkout;
pub mod discounts;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping;

use domain::PageRequest;
use serde::Deserialize;

use crate::error::ApiError;

/// `?page=&page_size=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn to_request(&self) -> Result<PageRequest, ApiError> {
        let defaults = PageRequest::default();
        Ok(PageRequest::new(
            self.page.unwrap_or(defaults.page()),
            self.page_size.unwrap_or(defaults.page_size()),
        )?)
    }
}
