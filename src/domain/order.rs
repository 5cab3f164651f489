use crate::domain::affiliate::AffiliateId;
use crate::domain::currency::{Country, Currency};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = u64;

/// Pending is the sole initial state; Delivered and Issue are terminal and
/// mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Delivered,
    Issue,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Delivered => write!(f, "delivered"),
            Self::Issue => write!(f, "issue"),
        }
    }
}

/// Fields of a new order; the store assigns the id and the initial status.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub affiliate_id: AffiliateId,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub city: String,
    pub country: Country,
    pub currency: Currency,
    pub product: String,
    pub product_code: String,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub commission: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A customer order submitted by an affiliate.
///
/// Prices and commission stay in the order's local currency for its whole
/// lifetime; settlement-currency values are derived at delivery time, never
/// stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub affiliate_id: AffiliateId,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub city: String,
    pub country: Country,
    pub currency: Currency,
    pub product: String,
    pub product_code: String,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub commission: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: OrderId, draft: OrderDraft) -> Self {
        Self {
            id,
            affiliate_id: draft.affiliate_id,
            customer_name: draft.customer_name,
            customer_phone: draft.customer_phone,
            address: draft.address,
            city: draft.city,
            country: draft.country,
            currency: draft.currency,
            product: draft.product,
            product_code: draft.product_code,
            cost_price: draft.cost_price,
            selling_price: draft.selling_price,
            commission: draft.commission,
            status: OrderStatus::Pending,
            created_at: draft.created_at,
        }
    }

    /// Pending → Delivered. The caller applies the ledger credit in the same
    /// transaction.
    pub fn deliver(&mut self) -> Result<()> {
        self.transition(OrderStatus::Delivered)
    }

    /// Pending → Issue. No ledger effect.
    pub fn flag_issue(&mut self) -> Result<()> {
        self.transition(OrderStatus::Issue)
    }

    fn transition(&mut self, to: OrderStatus) -> Result<()> {
        if self.status != OrderStatus::Pending {
            return Err(LedgerError::AlreadyProcessed {
                status: self.status.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}
