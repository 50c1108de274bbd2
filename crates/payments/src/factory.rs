use std::collections::BTreeMap;
use std::sync::Arc;

use domain::PaymentMethod;

use crate::{
    CreditCardStrategy, GatewayConfig, PayPalStrategy, PaymentError, PaymentStrategy, PixStrategy,
    ReferenceGenerator, Result,
};

/// Registry of payment strategies keyed by method.
#[derive(Clone, Default)]
pub struct PaymentStrategyFactory {
    strategies: BTreeMap<PaymentMethod, Arc<dyn PaymentStrategy>>,
}

impl PaymentStrategyFactory {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the credit card, PayPal and Pix gateways.
    pub fn with_defaults(config: GatewayConfig, references: Arc<ReferenceGenerator>) -> Self {
        Self::new()
            .with_strategy(Arc::new(CreditCardStrategy::new(
                config.clone(),
                Arc::clone(&references),
            )))
            .with_strategy(Arc::new(PayPalStrategy::new(config, Arc::clone(&references))))
            .with_strategy(Arc::new(PixStrategy::new(references)))
    }

    /// Registers `strategy`, replacing any strategy for the same method.
    pub fn with_strategy(mut self, strategy: Arc<dyn PaymentStrategy>) -> Self {
        self.strategies.insert(strategy.method(), strategy);
        self
    }

    pub fn resolve(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentStrategy>> {
        self.strategies
            .get(&method)
            .cloned()
            .ok_or(PaymentError::UnsupportedMethod(method))
    }

    pub fn methods(&self) -> impl Iterator<Item = PaymentMethod> + '_ {
        self.strategies.keys().copied()
    }
}

impl std::fmt::Debug for PaymentStrategyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentStrategyFactory")
            .field("methods", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}
