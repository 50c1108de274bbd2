use common::Money;
use domain::{MethodDetails, PaymentMethod};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credit_card::{CardBrand, last_four, normalize_card_number};

/// A charge to be sent to a gateway.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: Money,
    pub details: PaymentDetails,
}

/// Method-specific payload of a payment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaymentDetails {
    CreditCard(CreditCardDetails),
    PayPal(PayPalDetails),
    Pix(PixDetails),
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::CreditCard(_) => PaymentMethod::CreditCard,
            PaymentDetails::PayPal(_) => PaymentMethod::PayPal,
            PaymentDetails::Pix(_) => PaymentMethod::Pix,
        }
    }

    /// What is kept on the payment record. Card numbers are reduced to
    /// their last four digits.
    pub fn to_method_details(&self) -> MethodDetails {
        match self {
            PaymentDetails::CreditCard(card) => {
                MethodDetails::CreditCard {
                    last_four: last_four(&card.card_number),
                    brand: CardBrand::detect(&normalize_card_number(&card.card_number)).to_string(),
                }
            }
            PaymentDetails::PayPal(paypal) => MethodDetails::PayPal {
                email: paypal.email.clone(),
                payer_id: paypal.payer_id.clone(),
            },
            PaymentDetails::Pix(_) => MethodDetails::Pix,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CreditCardDetails {
    pub card_number: String,
    pub card_holder_name: String,
    /// `MM/YY`.
    pub expiration_date: String,
    pub cvv: String,
}

impl std::fmt::Debug for CreditCardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditCardDetails")
            .field(
                "card_number",
                &format_args!("****{}", last_four(&self.card_number)),
            )
            .field("card_holder_name", &self.card_holder_name)
            .field("expiration_date", &self.expiration_date)
            .field("cvv", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalDetails {
    pub email: String,
    pub payer_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PixDetails {
    /// Payer's Pix key, when known.
    pub key: Option<String>,
}

/// What a gateway answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub transaction_id: Uuid,
    /// Human-readable order tracking reference.
    pub reference: String,
    pub is_success: bool,
    pub message: String,
}
