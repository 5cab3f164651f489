use crate::domain::affiliate::{AdminId, Affiliate, AffiliateId, Balance, ExternalId, Registration};
use crate::domain::order::{Order, OrderDraft, OrderId};
use crate::domain::withdrawal::{Withdrawal, WithdrawalDraft, WithdrawalId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The persisted ledger, the single source of truth.
///
/// Every mutating method is one atomic commit unit: its state-dependent
/// preconditions (pending status, balance sufficiency, identity uniqueness,
/// no-pending-withdrawal) are evaluated against the same consistent snapshot
/// the mutation commits into. Two racing calls on the same entity are
/// linearized by the backend; the loser observes the winner's terminal state
/// and fails with `AlreadyProcessed` instead of double-applying.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new affiliate, failing with `DuplicateIdentity` if the
    /// external identity is already registered.
    async fn insert_affiliate(&self, registration: Registration) -> Result<Affiliate>;
    async fn affiliate(&self, id: AffiliateId) -> Result<Option<Affiliate>>;
    async fn affiliate_by_identity(&self, identity: ExternalId) -> Result<Option<Affiliate>>;
    async fn affiliates(&self) -> Result<Vec<Affiliate>>;

    /// Inserts a pending order and bumps the owner's `total_orders` counter
    /// in the same commit. Fails with `AffiliateNotFound` if the owner is
    /// missing.
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order>;
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;
    /// An affiliate's orders, newest first.
    async fn orders_by_affiliate(&self, id: AffiliateId) -> Result<Vec<Order>>;
    /// The admin queue: pending orders, oldest first.
    async fn pending_orders(&self) -> Result<Vec<Order>>;
    /// Orders the affiliate created at or after `since`.
    async fn count_orders_since(&self, id: AffiliateId, since: DateTime<Utc>) -> Result<u64>;
    async fn count_delivered_orders(&self, id: AffiliateId) -> Result<u64>;

    /// Pending → Delivered plus the ledger credit, one transaction.
    ///
    /// `commission` and `sale` are the order's commission and selling price
    /// already normalized to the settlement currency.
    async fn settle_delivery(&self, id: OrderId, commission: Balance, sale: Balance)
    -> Result<Order>;
    /// Pending → Issue. No ledger effect.
    async fn mark_issue(&self, id: OrderId) -> Result<Order>;

    /// Inserts a pending withdrawal after checking, on one snapshot, that the
    /// affiliate exists, has no other pending withdrawal, and that the amount
    /// is covered by the current balance.
    async fn insert_withdrawal(&self, draft: WithdrawalDraft) -> Result<Withdrawal>;
    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>>;
    /// An affiliate's withdrawals, newest first.
    async fn withdrawals_by_affiliate(&self, id: AffiliateId) -> Result<Vec<Withdrawal>>;
    /// The admin queue: pending withdrawals, oldest first.
    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>>;

    /// Pending → Approved plus the balance debit, one transaction. The
    /// balance is re-checked here; it may have shrunk since the request.
    async fn approve_withdrawal(
        &self,
        id: WithdrawalId,
        admin: AdminId,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal>;
    /// Pending → Rejected. No balance effect under deferred debit.
    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        admin: AdminId,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

/// Timestamp source, injectable so tests can drive the rate-limit window.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ClockBox = Box<dyn Clock>;
