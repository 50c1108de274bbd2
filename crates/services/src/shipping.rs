//! Shipping cost estimates by postal code.
//!
//! A [`PostalLookup`] resolves a Brazilian postal code (CEP) to an address;
//! the [`FlatRateTable`] then prices shipping by state.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::Money;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{Result, ServiceError};

/// Default ViaCEP endpoint.
pub const VIACEP_BASE_URL: &str = "https://viacep.com.br/ws";

/// Address data returned for a postal code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub postal_code: String,
    pub street: String,
    pub district: String,
    pub city: String,
    pub state: String,
}

/// Resolves postal codes to addresses.
#[async_trait]
pub trait PostalLookup: Send + Sync {
    /// Returns `None` when the postal code does not exist.
    async fn lookup(
        &self,
        postal_code: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PostalAddress>>;
}

#[derive(Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    cep: String,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    erro: Option<serde_json::Value>,
}

/// [`PostalLookup`] backed by a ViaCEP-compatible HTTP API.
pub struct HttpPostalLookup {
    client: Client,
    base_url: String,
}

impl HttpPostalLookup {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, postal_code: &str) -> Result<Option<PostalAddress>> {
        let response = self
            .client
            .get(format!("{}/{postal_code}/json/", self.base_url))
            .send()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Postal lookup failed: {e}")))?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::Unexpected(format!(
                "Postal lookup returned HTTP {}",
                response.status()
            )));
        }

        let body: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Invalid postal lookup response: {e}")))?;
        // ViaCEP answers unknown codes with 200 and an `erro` flag.
        if body.erro.is_some() {
            return Ok(None);
        }
        Ok(Some(PostalAddress {
            postal_code: body.cep,
            street: body.logradouro,
            district: body.bairro,
            city: body.localidade,
            state: body.uf,
        }))
    }
}

impl Default for HttpPostalLookup {
    fn default() -> Self {
        Self::new(VIACEP_BASE_URL)
    }
}

#[async_trait]
impl PostalLookup for HttpPostalLookup {
    async fn lookup(
        &self,
        postal_code: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PostalAddress>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(ServiceError::Unexpected("Postal lookup cancelled".to_string()))
            }
            result = self.fetch(postal_code) => result,
        }
    }
}

/// Shipping price per state, with a fallback for states not listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRateTable {
    rates: BTreeMap<String, Money>,
    default_rate: Money,
}

impl FlatRateTable {
    pub fn new(default_rate: Money) -> Self {
        Self {
            rates: BTreeMap::new(),
            default_rate,
        }
    }

    pub fn with_rate(mut self, state: &str, rate: Money) -> Self {
        self.rates.insert(state.trim().to_uppercase(), rate);
        self
    }

    pub fn rate_for(&self, state: &str) -> Money {
        self.rates
            .get(&state.trim().to_uppercase())
            .copied()
            .unwrap_or(self.default_rate)
    }
}

/// A priced shipping destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingEstimate {
    pub destination: PostalAddress,
    pub cost: Money,
}

pub struct ShippingEstimator {
    lookup: Arc<dyn PostalLookup>,
    rates: FlatRateTable,
}

impl ShippingEstimator {
    pub fn new(lookup: Arc<dyn PostalLookup>, rates: FlatRateTable) -> Self {
        Self { lookup, rates }
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn estimate(
        &self,
        postal_code: &str,
        cancel: &CancellationToken,
    ) -> Result<ShippingEstimate> {
        let digits = normalize_postal_code(postal_code)?;
        let destination = self
            .lookup
            .lookup(&digits, cancel)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Postal code {postal_code}")))?;
        let cost = self.rates.rate_for(&destination.state);

        tracing::debug!(state = %destination.state, cost = %cost, "Shipping estimated");
        Ok(ShippingEstimate { destination, cost })
    }
}

/// Strips formatting from a CEP and checks it has eight digits.
pub fn normalize_postal_code(postal_code: &str) -> Result<String> {
    let digits: String = postal_code
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | ' '))
        .collect();
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::validation(
            "PostalCode",
            "Postal code must have 8 digits",
        ));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brl(amount: &str) -> Money {
        Money::parse("BRL", amount).unwrap()
    }

    #[test]
    fn postal_code_formatting_is_ignored() {
        assert_eq!(normalize_postal_code("01310-100").unwrap(), "01310100");
        assert_eq!(normalize_postal_code(" 01.310-100 ").unwrap(), "01310100");
    }

    #[test]
    fn short_or_alphabetic_postal_codes_are_rejected() {
        for bad in ["0131010", "0131010A", ""] {
            let err = normalize_postal_code(bad).unwrap_err();
            assert!(
                matches!(&err, ServiceError::Validation(errors) if errors.contains("PostalCode")),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn unknown_states_use_the_default_rate() {
        let table = FlatRateTable::new(brl("30")).with_rate("sp", brl("15"));
        assert_eq!(table.rate_for("SP"), brl("15"));
        assert_eq!(table.rate_for("AM"), brl("30"));
    }

    #[test]
    fn viacep_error_flag_is_recognised() {
        let body: ViaCepResponse = serde_json::from_str(r#"{"erro": "true"}"#).unwrap();
        assert!(body.erro.is_some());

        let body: ViaCepResponse = serde_json::from_str(
            r#"{
                "cep": "01310-100",
                "logradouro": "Avenida Paulista",
                "bairro": "Bela Vista",
                "localidade": "São Paulo",
                "uf": "SP"
            }"#,
        )
        .unwrap();
        assert!(body.erro.is_none());
        assert_eq!(body.uf, "SP");
    }
}
