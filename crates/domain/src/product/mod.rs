//! Catalog product aggregate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, MoneyError, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during product operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    /// Product name is required.
    #[error("Product name is required")]
    NameRequired,

    /// Price must be greater than zero.
    #[error("Invalid price: {price} (must be greater than 0)")]
    NonPositivePrice { price: Money },

    /// The requested status change is not allowed.
    #[error("Invalid status transition: cannot {action} a {current} product")]
    InvalidStatusTransition {
        current: ProductStatus,
        action: &'static str,
    },

    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Sale status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
    /// No longer sold (terminal).
    Discontinued,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "Active",
            ProductStatus::Inactive => "Inactive",
            ProductStatus::OutOfStock => "OutOfStock",
            ProductStatus::Discontinued => "Discontinued",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to a category a product belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
    pub categories: BTreeSet<CategoryRef>,
}

/// Catalog product aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    price: Money,
    stock: u32,
    image_url: Option<String>,
    status: ProductStatus,
    categories: BTreeSet<CategoryRef>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Storage representation of a product.
#[derive(Debug, Clone)]
pub struct ProductParts {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
    pub status: ProductStatus,
    pub categories: BTreeSet<CategoryRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new active product.
    pub fn create(new: NewProduct) -> Result<Self, ProductError> {
        let name = validate_name(&new.name)?;
        validate_price(new.price)?;
        let now = Utc::now();
        let status = if new.stock == 0 {
            ProductStatus::OutOfStock
        } else {
            ProductStatus::Active
        };

        Ok(Self {
            id: ProductId::new(),
            name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            image_url: new.image_url,
            status,
            categories: new.categories,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates a product from storage.
    pub fn from_parts(parts: ProductParts) -> Result<Self, ProductError> {
        let name = validate_name(&parts.name)?;
        validate_price(parts.price)?;
        Ok(Self {
            id: parts.id,
            name,
            description: parts.description,
            price: parts.price,
            stock: parts.stock,
            image_url: parts.image_url,
            status: parts.status,
            categories: parts.categories,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    pub fn to_parts(&self) -> ProductParts {
        ProductParts {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            image_url: self.image_url.clone(),
            status: self.status,
            categories: self.categories.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn categories(&self) -> &BTreeSet<CategoryRef> {
        &self.categories
    }

    /// Returns the ids of the categories this product belongs to.
    pub fn category_ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.categories.iter().map(|c| c.id)
    }

    /// Returns true if the product can currently be sold.
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active && self.stock > 0
    }

    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Command methods
impl Product {
    /// Removes `quantity` units from stock.
    ///
    /// Returns false and leaves the product untouched when there is not
    /// enough stock.
    #[must_use]
    pub fn decrement_stock(&mut self, quantity: u32) -> bool {
        if self.stock < quantity {
            return false;
        }
        self.stock -= quantity;
        if self.stock == 0 && self.status == ProductStatus::Active {
            self.status = ProductStatus::OutOfStock;
        }
        self.touch();
        true
    }

    /// Returns `quantity` units to stock.
    pub fn increment_stock(&mut self, quantity: u32) {
        self.stock = self.stock.saturating_add(quantity);
        if self.stock > 0 && self.status == ProductStatus::OutOfStock {
            self.status = ProductStatus::Active;
        }
        self.touch();
    }

    /// Overwrites the stock level.
    pub fn set_stock(&mut self, stock: u32) {
        self.stock = stock;
        match self.status {
            ProductStatus::Active if stock == 0 => self.status = ProductStatus::OutOfStock,
            ProductStatus::OutOfStock if stock > 0 => self.status = ProductStatus::Active,
            _ => {}
        }
        self.touch();
    }

    /// Changes the price. The currency must stay the same.
    pub fn update_price(&mut self, price: Money) -> Result<(), ProductError> {
        validate_price(price)?;
        if !price.same_currency(&self.price) {
            return Err(MoneyError::CurrencyMismatch {
                left: self.price.currency(),
                right: price.currency(),
            }
            .into());
        }
        self.price = price;
        self.touch();
        Ok(())
    }

    /// Updates descriptive fields.
    pub fn update_details(
        &mut self,
        name: &str,
        description: impl Into<String>,
        image_url: Option<String>,
    ) -> Result<(), ProductError> {
        self.name = validate_name(name)?;
        self.description = description.into();
        self.image_url = image_url;
        self.touch();
        Ok(())
    }

    pub fn activate(&mut self) -> Result<(), ProductError> {
        if self.status == ProductStatus::Discontinued {
            return Err(ProductError::InvalidStatusTransition {
                current: self.status,
                action: "activate",
            });
        }
        self.status = if self.stock == 0 {
            ProductStatus::OutOfStock
        } else {
            ProductStatus::Active
        };
        self.touch();
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), ProductError> {
        if self.status == ProductStatus::Discontinued {
            return Err(ProductError::InvalidStatusTransition {
                current: self.status,
                action: "deactivate",
            });
        }
        self.status = ProductStatus::Inactive;
        self.touch();
        Ok(())
    }

    pub fn discontinue(&mut self) {
        self.status = ProductStatus::Discontinued;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn validate_name(name: &str) -> Result<String, ProductError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProductError::NameRequired);
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: Money) -> Result<(), ProductError> {
    if !price.is_positive() {
        return Err(ProductError::NonPositivePrice { price });
    }
    Ok(())
}
