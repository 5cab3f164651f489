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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for affiliate rows.
pub const CF_AFFILIATES: &str = "affiliates";
/// Column Family for the external-identity → affiliate-id index.
pub const CF_IDENTITIES: &str = "identities";
/// Column Family for order rows.
pub const CF_ORDERS: &str = "orders";
/// Column Family for withdrawal rows.
pub const CF_WITHDRAWALS: &str = "withdrawals";
/// Column Family for id counters.
pub const CF_META: &str = "meta";

const KEY_NEXT_AFFILIATE: &str = "next_affiliate_id";
const KEY_NEXT_ORDER: &str = "next_order_id";
const KEY_NEXT_WITHDRAWAL: &str = "next_withdrawal_id";

/// A persistent ledger backed by RocksDB.
///
/// Each entity lives in its own Column Family with big-endian id keys and
/// serde_json values. Mutating operations serialize through a store-wide
/// async mutex and commit via a `WriteBatch`, so the check-then-mutate
/// sequence of every operation lands atomically; reads go straight to the
/// DB without the mutex (display-level consistency).
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbLedger {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_AFFILIATES,
            CF_IDENTITIES,
            CF_ORDERS,
            CF_WITHDRAWALS,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| LedgerError::Storage(format!("deserialization error: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| LedgerError::Storage(format!("serialization error: {e}")))?;
        batch.put_cf(cf, key, bytes);
        Ok(())
    }

    /// Reads an id counter and stages its increment into `batch`. Only called
    /// with the write lock held.
    fn bump_id(&self, batch: &mut WriteBatch, key: &str) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let last = match self.db.get_cf(cf, key)? {
            Some(bytes) => u64::from_be_bytes(
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LedgerError::Storage(format!("corrupt id counter {key}")))?,
            ),
            None => 0,
        };
        let id = last + 1;
        batch.put_cf(cf, key, id.to_be_bytes());
        Ok(id)
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let row = serde_json::from_slice(&value)
                .map_err(|e| LedgerError::Storage(format!("deserialization error: {e}")))?;
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedger {
    async fn insert_affiliate(&self, registration: Registration) -> Result<Affiliate> {
        let _guard = self.write_lock.lock().await;
        let identity_key = registration.identity.to_be_bytes();
        if self.db.get_cf(self.cf(CF_IDENTITIES)?, identity_key)?.is_some() {
            return Err(LedgerError::DuplicateIdentity(registration.identity));
        }

        let mut batch = WriteBatch::default();
        let id = self.bump_id(&mut batch, KEY_NEXT_AFFILIATE)?;
        let affiliate = Affiliate::new(id, registration);
        batch.put_cf(self.cf(CF_IDENTITIES)?, identity_key, id.to_be_bytes());
        self.put_json(&mut batch, CF_AFFILIATES, id.to_be_bytes(), &affiliate)?;
        self.db.write(batch)?;
        Ok(affiliate)
    }

    async fn affiliate(&self, id: AffiliateId) -> Result<Option<Affiliate>> {
        self.get_json(CF_AFFILIATES, id.to_be_bytes())
    }

    async fn affiliate_by_identity(&self, identity: ExternalId) -> Result<Option<Affiliate>> {
        let Some(bytes) = self
            .db
            .get_cf(self.cf(CF_IDENTITIES)?, identity.to_be_bytes())?
        else {
            return Ok(None);
        };
        let id = u64::from_be_bytes(
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| LedgerError::Storage("corrupt identity index".to_string()))?,
        );
        self.get_json(CF_AFFILIATES, id.to_be_bytes())
    }

    async fn affiliates(&self) -> Result<Vec<Affiliate>> {
        self.scan(CF_AFFILIATES)
    }

    async fn insert_order(&self, draft: OrderDraft) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut affiliate: Affiliate = self
            .get_json(CF_AFFILIATES, draft.affiliate_id.to_be_bytes())?
            .ok_or(LedgerError::AffiliateNotFound(draft.affiliate_id))?;

        let mut batch = WriteBatch::default();
        let id = self.bump_id(&mut batch, KEY_NEXT_ORDER)?;
        let order = Order::new(id, draft);
        affiliate.total_orders += 1;
        self.put_json(&mut batch, CF_ORDERS, id.to_be_bytes(), &order)?;
        self.put_json(
            &mut batch,
            CF_AFFILIATES,
            affiliate.id.to_be_bytes(),
            &affiliate,
        )?;
        self.db.write(batch)?;
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, id.to_be_bytes())
    }

    async fn orders_by_affiliate(&self, id: AffiliateId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .scan::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|order| order.affiliate_id == id)
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn pending_orders(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .scan::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|order| order.status == OrderStatus::Pending)
            .collect();
        orders.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(orders)
    }

    async fn count_orders_since(&self, id: AffiliateId, since: DateTime<Utc>) -> Result<u64> {
        Ok(self
            .scan::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|order| order.affiliate_id == id && order.created_at >= since)
            .count() as u64)
    }

    async fn count_delivered_orders(&self, id: AffiliateId) -> Result<u64> {
        Ok(self
            .scan::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|order| order.affiliate_id == id && order.status == OrderStatus::Delivered)
            .count() as u64)
    }

    async fn settle_delivery(
        &self,
        id: OrderId,
        commission: Balance,
        sale: Balance,
    ) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order: Order = self
            .get_json(CF_ORDERS, id.to_be_bytes())?
            .ok_or(LedgerError::OrderNotFound(id))?;
        let mut affiliate: Affiliate = self
            .get_json(CF_AFFILIATES, order.affiliate_id.to_be_bytes())?
            .ok_or(LedgerError::AffiliateNotFound(order.affiliate_id))?;

        order.deliver()?;
        affiliate.credit_delivery(commission, sale);

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ORDERS, id.to_be_bytes(), &order)?;
        self.put_json(
            &mut batch,
            CF_AFFILIATES,
            affiliate.id.to_be_bytes(),
            &affiliate,
        )?;
        self.db.write(batch)?;
        Ok(order)
    }

    async fn mark_issue(&self, id: OrderId) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order: Order = self
            .get_json(CF_ORDERS, id.to_be_bytes())?
            .ok_or(LedgerError::OrderNotFound(id))?;
        order.flag_issue()?;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ORDERS, id.to_be_bytes(), &order)?;
        self.db.write(batch)?;
        Ok(order)
    }

    async fn insert_withdrawal(&self, draft: WithdrawalDraft) -> Result<Withdrawal> {
        let _guard = self.write_lock.lock().await;
        let affiliate: Affiliate = self
            .get_json(CF_AFFILIATES, draft.affiliate_id.to_be_bytes())?
            .ok_or(LedgerError::AffiliateNotFound(draft.affiliate_id))?;

        let has_pending = self
            .scan::<Withdrawal>(CF_WITHDRAWALS)?
            .into_iter()
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

        let mut batch = WriteBatch::default();
        let id = self.bump_id(&mut batch, KEY_NEXT_WITHDRAWAL)?;
        let withdrawal = Withdrawal::new(id, draft);
        self.put_json(&mut batch, CF_WITHDRAWALS, id.to_be_bytes(), &withdrawal)?;
        self.db.write(batch)?;
        Ok(withdrawal)
    }

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>> {
        self.get_json(CF_WITHDRAWALS, id.to_be_bytes())
    }

    async fn withdrawals_by_affiliate(&self, id: AffiliateId) -> Result<Vec<Withdrawal>> {
        let mut withdrawals: Vec<Withdrawal> = self
            .scan::<Withdrawal>(CF_WITHDRAWALS)?
            .into_iter()
            .filter(|w| w.affiliate_id == id)
            .collect();
        withdrawals.sort_by(|a, b| (b.requested_at, b.id).cmp(&(a.requested_at, a.id)));
        Ok(withdrawals)
    }

    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        let mut withdrawals: Vec<Withdrawal> = self
            .scan::<Withdrawal>(CF_WITHDRAWALS)?
            .into_iter()
            .filter(|w| w.status == WithdrawalStatus::Pending)
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
        let _guard = self.write_lock.lock().await;
        let mut withdrawal: Withdrawal = self
            .get_json(CF_WITHDRAWALS, id.to_be_bytes())?
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(LedgerError::AlreadyProcessed {
                status: withdrawal.status.to_string(),
            });
        }
        let mut affiliate: Affiliate = self
            .get_json(CF_AFFILIATES, withdrawal.affiliate_id.to_be_bytes())?
            .ok_or(LedgerError::AffiliateNotFound(withdrawal.affiliate_id))?;

        affiliate.debit(withdrawal.amount)?;
        withdrawal.approve(admin, now)?;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_WITHDRAWALS, id.to_be_bytes(), &withdrawal)?;
        self.put_json(
            &mut batch,
            CF_AFFILIATES,
            affiliate.id.to_be_bytes(),
            &affiliate,
        )?;
        self.db.write(batch)?;
        Ok(withdrawal)
    }

    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        admin: AdminId,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let _guard = self.write_lock.lock().await;
        let mut withdrawal: Withdrawal = self
            .get_json(CF_WITHDRAWALS, id.to_be_bytes())?
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        withdrawal.reject(admin, now)?;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_WITHDRAWALS, id.to_be_bytes(), &withdrawal)?;
        self.db.write(batch)?;
        Ok(withdrawal)
    }
}
