use crate::domain::affiliate::{AdminId, AffiliateId, Amount};
use crate::domain::currency::Currency;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type WithdrawalId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Fields of a new withdrawal request; the store assigns the id.
#[derive(Debug, Clone)]
pub struct WithdrawalDraft {
    pub affiliate_id: AffiliateId,
    pub amount: Amount,
    pub phone: String,
    pub currency: Currency,
    pub requested_at: DateTime<Utc>,
}

/// A payout request against an affiliate's balance.
///
/// `amount` is natively in the settlement currency. Under the deferred-debit
/// policy the balance is only touched when the request is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub affiliate_id: AffiliateId,
    pub amount: Amount,
    pub phone: String,
    pub currency: Currency,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<AdminId>,
}

impl Withdrawal {
    pub fn new(id: WithdrawalId, draft: WithdrawalDraft) -> Self {
        Self {
            id,
            affiliate_id: draft.affiliate_id,
            amount: draft.amount,
            phone: draft.phone,
            currency: draft.currency,
            status: WithdrawalStatus::Pending,
            requested_at: draft.requested_at,
            processed_at: None,
            processed_by: None,
        }
    }

    /// Pending → Approved. The caller debits the affiliate in the same
    /// transaction.
    pub fn approve(&mut self, admin: AdminId, now: DateTime<Utc>) -> Result<()> {
        self.transition(WithdrawalStatus::Approved, admin, now)
    }

    /// Pending → Rejected. No balance effect.
    pub fn reject(&mut self, admin: AdminId, now: DateTime<Utc>) -> Result<()> {
        self.transition(WithdrawalStatus::Rejected, admin, now)
    }

    fn transition(&mut self, to: WithdrawalStatus, admin: AdminId, now: DateTime<Utc>) -> Result<()> {
        if self.status != WithdrawalStatus::Pending {
            return Err(LedgerError::AlreadyProcessed {
                status: self.status.to_string(),
            });
        }
        self.status = to;
        self.processed_at = Some(now);
        self.processed_by = Some(admin);
        Ok(())
    }
}
