//! Billing service interface.
//!
//! Bill persistence, tax breakdown and receipt layout live behind this
//! trait. The runtime only hands over the cart and gets a numbered receipt
//! back.

use async_trait::async_trait;
use mart_core::{CartSnapshot, Money, PaymentMethod, ReceiptRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BillingError;

/// A bill ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillRequest {
    /// Idempotency key: resubmitting the same request must not create a
    /// second bill.
    pub request_id: Uuid,
    pub cart: CartSnapshot,
    pub discount: Money,
    pub payment_method: PaymentMethod,
}

impl BillRequest {
    pub fn new(cart: CartSnapshot, payment_method: PaymentMethod) -> Self {
        BillRequest {
            request_id: Uuid::new_v4(),
            discount: cart.discount,
            cart,
            payment_method,
        }
    }
}

#[async_trait]
pub trait BillingService: Send + Sync {
    async fn submit_bill(&self, bill: &BillRequest) -> Result<ReceiptRecord, BillingError>;
}
