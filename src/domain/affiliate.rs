use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

pub type AffiliateId = u64;
/// External identity an affiliate registers with (one registration each).
pub type ExternalId = i64;
/// Identity of the administrator who processed a withdrawal.
pub type AdminId = i64;

/// A settlement-currency running total.
///
/// This is a wrapper around `rust_decimal::Decimal` to enforce domain-specific
/// rules and provide type safety for financial calculations. Affiliate
/// balances never go negative; the mutation methods on [`Affiliate`] enforce
/// that.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive monetary amount, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// Registration fields for a new affiliate; the store assigns the id.
#[derive(Debug, Clone)]
pub struct Registration {
    pub identity: ExternalId,
    pub name: String,
    pub phone: String,
    pub store_name: String,
}

/// The authoritative ledger row for one affiliate.
///
/// Mutated only by the order-delivery and withdrawal-approval transitions;
/// the counters are lifetime totals and never decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliate {
    pub id: AffiliateId,
    pub identity: ExternalId,
    pub name: String,
    pub phone: String,
    pub store_name: String,
    /// Spendable commission balance, settlement currency.
    pub balance: Balance,
    /// Lifetime realized commissions, settlement currency.
    pub total_earnings: Balance,
    /// Lifetime realized selling prices, settlement currency.
    pub total_sales: Balance,
    /// Orders ever submitted, regardless of outcome.
    pub total_orders: u64,
}

impl Affiliate {
    pub fn new(id: AffiliateId, registration: Registration) -> Self {
        Self {
            id,
            identity: registration.identity,
            name: registration.name,
            phone: registration.phone,
            store_name: registration.store_name,
            balance: Balance::ZERO,
            total_earnings: Balance::ZERO,
            total_sales: Balance::ZERO,
            total_orders: 0,
        }
    }

    /// Applies a delivered order: the commission lands on both the spendable
    /// balance and the lifetime earnings, the sale on the sales total.
    pub fn credit_delivery(&mut self, commission: Balance, sale: Balance) {
        self.balance += commission;
        self.total_earnings += commission;
        self.total_sales += sale;
    }

    /// Debits an approved withdrawal if the balance covers it.
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        let debit = Balance::from(amount);
        if self.balance >= debit {
            self.balance -= debit;
            Ok(())
        } else {
            Err(LedgerError::InsufficientBalance {
                requested: amount.value(),
                available: self.balance.value(),
            })
        }
    }
}
