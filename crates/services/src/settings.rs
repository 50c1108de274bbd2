use common::CurrencyCode;

/// Workflow settings the binary fills from its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Currency of newly created carts.
    pub default_currency: CurrencyCode,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            default_currency: CurrencyCode::BRL,
        }
    }
}
