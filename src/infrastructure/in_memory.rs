use crate::domain::affiliate::{
    AdminId, Affiliate, AffiliateId, Balance, ExternalId, Registration,
};
use crate::domain::order::{Order, OrderDraft, OrderId, OrderStatus};
use crate::domain::ports::LedgerStore;
use crate::domain::withdrawal::{
    Withdrawal, WithdrawalDraft, WithdrawalId, WithdrawalStatus,
};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    affiliates: HashMap<AffiliateId, Affiliate>,
    identities: HashMap<ExternalId, AffiliateId>,
    orders: HashMap<OrderId, Order>,
    withdrawals: HashMap<WithdrawalId, Withdrawal>,
    next_affiliate_id: AffiliateId,
    next_order_id: OrderId,
    next_withdrawal_id: WithdrawalId,
}

impl LedgerState {
    fn next_affiliate_id(&mut self) -> AffiliateId {
        self.next_affiliate_id += 1;
        self.next_affiliate_id
    }

    fn next_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        self.next_order_id
    }

    fn next_withdrawal_id(&mut self) -> WithdrawalId {
        self.next_withdrawal_id += 1;
        self.next_withdrawal_id
    }
}

/// A thread-safe in-memory ledger.
///
/// All tables live behind one `Arc<RwLock<_>>`: every mutating operation
/// holds the write lock across its whole check-then-mutate sequence, which
/// makes each one a serializable commit unit. Ideal for tests and single
/// process runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn insert_affiliate(&self, registration: Registration) -> Result<Affiliate> {
        let mut state = self.state.write().await;
        if state.identities.contains_key(&registration.identity) {
            return Err(LedgerError::DuplicateIdentity(registration.identity));
        }
        let id = state.next_affiliate_id();
        let affiliate = Affiliate::new(id, registration);
        state.identities.insert(affiliate.identity, id);
        state.affiliates.insert(id, affiliate.clone());
        Ok(affiliate)
    }

    async fn affiliate(&self, id: AffiliateId) -> Result<Option<Affiliate>> {
        let state = self.state.read().await;
        Ok(state.affiliates.get(&id).cloned())
    }

    async fn affiliate_by_identity(&self, identity: ExternalId) -> Result<Option<Affiliate>> {
        let state = self.state.read().await;
        Ok(state
            .identities
            .get(&identity)
            .and_then(|id| state.affiliates.get(id))
            .cloned())
    }

    async fn affiliates(&self) -> Result<Vec<Affiliate>> {
        let state = self.state.read().await;
        Ok(state.affiliates.values().cloned().collect())
    }

    async fn insert_order(&self, draft: OrderDraft) -> Result<Order> {
        let mut state = self.state.write().await;
        let affiliate_id = draft.affiliate_id;
        if !state.affiliates.contains_key(&affiliate_id) {
            return Err(LedgerError::AffiliateNotFound(affiliate_id));
        }
        let id = state.next_order_id();
        let order = Order::new(id, draft);
        // The lifetime counter moves in the same commit as the insert.
        if let Some(affiliate) = state.affiliates.get_mut(&affiliate_id) {
            affiliate.total_orders += 1;
        }
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn orders_by_affiliate(&self, id: AffiliateId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.affiliate_id == id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn pending_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.status == OrderStatus::Pending)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(orders)
    }

    async fn count_orders_since(&self, id: AffiliateId, since: DateTime<Utc>) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|order| order.affiliate_id == id && order.created_at >= since)
            .count() as u64)
    }

    async fn count_delivered_orders(&self, id: AffiliateId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|order| order.affiliate_id == id && order.status == OrderStatus::Delivered)
            .count() as u64)
    }

    async fn settle_delivery(
        &self,
        id: OrderId,
        commission: Balance,
        sale: Balance,
    ) -> Result<Order> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(LedgerError::OrderNotFound(id))?;
        let affiliate = state
            .affiliates
            .get_mut(&order.affiliate_id)
            .ok_or(LedgerError::AffiliateNotFound(order.affiliate_id))?;

        order.deliver()?;
        affiliate.credit_delivery(commission, sale);
        Ok(order.clone())
    }

    async fn mark_issue(&self, id: OrderId) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(LedgerError::OrderNotFound(id))?;
        order.flag_issue()?;
        Ok(order.clone())
    }

    async fn insert_withdrawal(&self, draft: WithdrawalDraft) -> Result<Withdrawal> {
        let mut state = self.state.write().await;
        let affiliate = state
            .affiliates
            .get(&draft.affiliate_id)
            .ok_or(LedgerError::AffiliateNotFound(draft.affiliate_id))?;

        let has_pending = state
            .withdrawals
            .values()
            .any(|w| w.affiliate_id == draft.affiliate_id && w.status == WithdrawalStatus::Pending);
        if has_pending {
            return Err(LedgerError::DuplicatePending);
        }
        if Balance::from(draft.amount) > affiliate.balance {
            return Err(LedgerError::InsufficientBalance {
                requested: draft.amount.value(),
                available: affiliate.balance.value(),
            });
        }

        let id = state.next_withdrawal_id();
        let withdrawal = Withdrawal::new(id, draft);
        state.withdrawals.insert(id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>> {
        let state = self.state.read().await;
        Ok(state.withdrawals.get(&id).cloned())
    }

    async fn withdrawals_by_affiliate(&self, id: AffiliateId) -> Result<Vec<Withdrawal>> {
        let state = self.state.read().await;
        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .values()
            .filter(|w| w.affiliate_id == id)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| (b.requested_at, b.id).cmp(&(a.requested_at, a.id)));
        Ok(withdrawals)
    }

    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        let state = self.state.read().await;
        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| (a.requested_at, a.id).cmp(&(b.requested_at, b.id)));
        Ok(withdrawals)
    }

    async fn approve_withdrawal(
        &self,
        id: WithdrawalId,
        admin: AdminId,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let withdrawal = state
            .withdrawals
            .get_mut(&id)
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(LedgerError::AlreadyProcessed {
                status: withdrawal.status.to_string(),
            });
        }
        let affiliate = state
            .affiliates
            .get_mut(&withdrawal.affiliate_id)
            .ok_or(LedgerError::AffiliateNotFound(withdrawal.affiliate_id))?;

        // Balance may have changed since the request; the debit re-checks it
        // before any mutation happens.
        affiliate.debit(withdrawal.amount)?;
        withdrawal.approve(admin, now)?;
        Ok(withdrawal.clone())
    }

    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        admin: AdminId,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let mut state = self.state.write().await;
        let withdrawal = state
            .withdrawals
            .get_mut(&id)
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        withdrawal.reject(admin, now)?;
        Ok(withdrawal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::affiliate::Amount;
    use crate::domain::currency::{Country, Currency};
    use rust_decimal_macros::dec;

    fn registration(identity: ExternalId) -> Registration {
        Registration {
            identity,
            name: "Mona".to_string(),
            phone: "+201234567890".to_string(),
            store_name: "Mona Store".to_string(),
        }
    }

    fn order_draft(affiliate_id: AffiliateId) -> OrderDraft {
        OrderDraft {
            affiliate_id,
            customer_name: "Ahmed".to_string(),
            customer_phone: "+966123456789".to_string(),
            address: "12 King Fahd Rd".to_string(),
            city: "Riyadh".to_string(),
            country: Country::SaudiArabia,
            currency: Currency::Sar,
            product: "Blender".to_string(),
            product_code: "BL-200".to_string(),
            cost_price: dec!(100),
            selling_price: dec!(150),
            commission: dec!(50),
            created_at: Utc::now(),
        }
    }

    fn withdrawal_draft(affiliate_id: AffiliateId, amount: rust_decimal::Decimal) -> WithdrawalDraft {
        WithdrawalDraft {
            affiliate_id,
            amount: Amount::new(amount).unwrap(),
            phone: "+201234567890".to_string(),
            currency: Currency::Usd,
            requested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_affiliate_identity_index() {
        let store = InMemoryLedger::new();
        let affiliate = store.insert_affiliate(registration(555)).await.unwrap();

        let by_identity = store.affiliate_by_identity(555).await.unwrap().unwrap();
        assert_eq!(by_identity, affiliate);
        assert!(store.affiliate_by_identity(556).await.unwrap().is_none());

        assert!(matches!(
            store.insert_affiliate(registration(555)).await,
            Err(LedgerError::DuplicateIdentity(555))
        ));
    }

    #[tokio::test]
    async fn test_insert_order_requires_affiliate() {
        let store = InMemoryLedger::new();
        assert!(matches!(
            store.insert_order(order_draft(1)).await,
            Err(LedgerError::AffiliateNotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_insert_order_bumps_counter_in_same_commit() {
        let store = InMemoryLedger::new();
        let affiliate = store.insert_affiliate(registration(555)).await.unwrap();

        store.insert_order(order_draft(affiliate.id)).await.unwrap();
        store.insert_order(order_draft(affiliate.id)).await.unwrap();

        let affiliate = store.affiliate(affiliate.id).await.unwrap().unwrap();
        assert_eq!(affiliate.total_orders, 2);
    }

    #[tokio::test]
    async fn test_settle_delivery_applies_exactly_once() {
        let store = InMemoryLedger::new();
        let affiliate = store.insert_affiliate(registration(555)).await.unwrap();
        let order = store.insert_order(order_draft(affiliate.id)).await.unwrap();

        store
            .settle_delivery(order.id, Balance::new(dec!(13.50)), Balance::new(dec!(40.50)))
            .await
            .unwrap();
        let err = store
            .settle_delivery(order.id, Balance::new(dec!(13.50)), Balance::new(dec!(40.50)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyProcessed { .. }));

        let affiliate = store.affiliate(affiliate.id).await.unwrap().unwrap();
        assert_eq!(affiliate.balance, Balance::new(dec!(13.50)));
        assert_eq!(affiliate.total_sales, Balance::new(dec!(40.50)));
    }

    #[tokio::test]
    async fn test_withdrawal_snapshot_checks() {
        let store = InMemoryLedger::new();
        let affiliate = store.insert_affiliate(registration(555)).await.unwrap();
        let order = store.insert_order(order_draft(affiliate.id)).await.unwrap();
        store
            .settle_delivery(order.id, Balance::new(dec!(100)), Balance::new(dec!(300)))
            .await
            .unwrap();

        assert!(matches!(
            store.insert_withdrawal(withdrawal_draft(affiliate.id, dec!(150))).await,
            Err(LedgerError::InsufficientBalance { .. })
        ));

        store
            .insert_withdrawal(withdrawal_draft(affiliate.id, dec!(60)))
            .await
            .unwrap();
        assert!(matches!(
            store.insert_withdrawal(withdrawal_draft(affiliate.id, dec!(10))).await,
            Err(LedgerError::DuplicatePending)
        ));
    }

    #[tokio::test]
    async fn test_approve_recheck_balance_at_approval_time() {
        let store = InMemoryLedger::new();
        let affiliate = store.insert_affiliate(registration(555)).await.unwrap();
        let order = store.insert_order(order_draft(affiliate.id)).await.unwrap();
        store
            .settle_delivery(order.id, Balance::new(dec!(100)), Balance::new(dec!(300)))
            .await
            .unwrap();
        let withdrawal = store
            .insert_withdrawal(withdrawal_draft(affiliate.id, dec!(100)))
            .await
            .unwrap();

        // Simulate the balance drifting below the requested amount between
        // request and approval.
        store
            .state
            .write()
            .await
            .affiliates
            .get_mut(&affiliate.id)
            .unwrap()
            .balance = Balance::new(dec!(40));

        let err = store
            .approve_withdrawal(withdrawal.id, 42, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        // The request is still pending and the balance untouched.
        let withdrawal = store.withdrawal(withdrawal.id).await.unwrap().unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
        let affiliate = store.affiliate(affiliate.id).await.unwrap().unwrap();
        assert_eq!(affiliate.balance, Balance::new(dec!(40)));
    }

    #[tokio::test]
    async fn test_admin_queues_are_oldest_first() {
        let store = InMemoryLedger::new();
        let affiliate = store.insert_affiliate(registration(555)).await.unwrap();

        let first = store.insert_order(order_draft(affiliate.id)).await.unwrap();
        let second = store.insert_order(order_draft(affiliate.id)).await.unwrap();
        store
            .settle_delivery(first.id, Balance::new(dec!(1)), Balance::new(dec!(2)))
            .await
            .unwrap();

        let pending = store.pending_orders().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);

        let history = store.orders_by_affiliate(affiliate.id).await.unwrap();
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }
}
