use crate::application::rate_limit::RateLimiter;
use crate::config::Config;
use crate::domain::affiliate::{
    AdminId, Affiliate, AffiliateId, Amount, Balance, ExternalId, Registration,
};
use crate::domain::currency::Country;
use crate::domain::order::{Order, OrderDraft, OrderId};
use crate::domain::ports::{ClockBox, LedgerStoreBox};
use crate::domain::withdrawal::{Withdrawal, WithdrawalDraft, WithdrawalId};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Validated order fields as supplied by the collector surface.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub city: String,
    pub country: Country,
    pub product: String,
    pub product_code: String,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
}

/// An affiliate's counters plus the delivered-order count derived from its
/// order history.
#[derive(Debug, Clone, PartialEq)]
pub struct AffiliateStats {
    pub affiliate: Affiliate,
    pub delivered_orders: u64,
}

/// The main entry point for every ledger operation.
///
/// `AffiliateEngine` owns the storage backend and the process configuration.
/// Each operation validates its inputs, then delegates the state-dependent
/// checks and the mutation to a single atomic store call, so concurrent or
/// duplicate calls are resolved by the store's linearization rather than by
/// in-process state.
pub struct AffiliateEngine {
    store: LedgerStoreBox,
    clock: ClockBox,
    config: Config,
    limiter: RateLimiter,
}

impl AffiliateEngine {
    pub fn new(store: LedgerStoreBox, clock: ClockBox, config: Config) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_per_minute);
        Self {
            store,
            clock,
            config,
            limiter,
        }
    }

    /// Registers a new affiliate. Each external identity registers once.
    pub async fn register_affiliate(&self, registration: Registration) -> Result<Affiliate> {
        non_empty(&registration.name, "name")?;
        non_empty(&registration.phone, "phone")?;
        non_empty(&registration.store_name, "store name")?;

        let affiliate = self.store.insert_affiliate(registration).await?;
        info!(
            affiliate = affiliate.id,
            identity = affiliate.identity,
            name = %affiliate.name,
            "affiliate registered"
        );
        Ok(affiliate)
    }

    /// Creates a pending order and bumps the owner's lifetime order counter.
    ///
    /// The counter increments at creation, independent of the order's
    /// eventual outcome.
    pub async fn create_order(
        &self,
        affiliate_id: AffiliateId,
        request: OrderRequest,
    ) -> Result<Order> {
        if request.cost_price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPricing(
                "cost price must be positive".to_string(),
            ));
        }
        if request.selling_price <= request.cost_price {
            return Err(LedgerError::InvalidPricing(
                "selling price must exceed cost price".to_string(),
            ));
        }
        non_empty(&request.customer_name, "customer name")?;
        non_empty(&request.customer_phone, "customer phone")?;
        non_empty(&request.address, "address")?;
        non_empty(&request.city, "city")?;
        non_empty(&request.product, "product")?;
        non_empty(&request.product_code, "product code")?;

        self.store
            .affiliate(affiliate_id)
            .await?
            .ok_or(LedgerError::AffiliateNotFound(affiliate_id))?;

        let now = self.clock.now();
        if !self
            .limiter
            .allow_order(self.store.as_ref(), affiliate_id, now)
            .await?
        {
            warn!(affiliate = affiliate_id, "order rate limit reached");
            return Err(LedgerError::RateLimited);
        }

        let currency = request.country.currency();
        let commission = self
            .config
            .commission_policy
            .commission(request.cost_price, request.selling_price);

        let order = self
            .store
            .insert_order(OrderDraft {
                affiliate_id,
                customer_name: request.customer_name,
                customer_phone: request.customer_phone,
                address: request.address,
                city: request.city,
                country: request.country,
                currency,
                product: request.product,
                product_code: request.product_code,
                cost_price: request.cost_price,
                selling_price: request.selling_price,
                commission,
                created_at: now,
            })
            .await?;
        info!(
            order = order.id,
            affiliate = affiliate_id,
            commission = %order.commission,
            currency = %order.currency,
            "order created"
        );
        Ok(order)
    }

    /// Confirms delivery: the one transition that credits the ledger.
    ///
    /// Commission and selling price are normalized to the settlement currency
    /// up front; both are immutable after creation, so reading them outside
    /// the commit is safe. The status re-check and the credit happen inside
    /// the store transaction.
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))?;

        let commission = self
            .config
            .currencies
            .to_settlement(order.commission, order.currency)?;
        let sale = self
            .config
            .currencies
            .to_settlement(order.selling_price, order.currency)?;

        let order = self
            .store
            .settle_delivery(order_id, Balance::new(commission), Balance::new(sale))
            .await?;
        info!(
            order = order.id,
            affiliate = order.affiliate_id,
            commission = %commission,
            "order delivered, commission credited"
        );
        Ok(order)
    }

    /// Flags a problem order. Terminal, with no ledger effect.
    pub async fn mark_issue(&self, order_id: OrderId) -> Result<Order> {
        let order = self.store.mark_issue(order_id).await?;
        info!(order = order.id, affiliate = order.affiliate_id, "order flagged as issue");
        Ok(order)
    }

    /// Files a withdrawal request against the affiliate's balance.
    ///
    /// Deferred-debit policy: the balance is untouched until approval.
    pub async fn request_withdrawal(
        &self,
        affiliate_id: AffiliateId,
        amount: Decimal,
        phone: String,
    ) -> Result<Withdrawal> {
        let amount = Amount::new(amount)?;
        if amount.value() < self.config.min_withdrawal {
            return Err(LedgerError::BelowMinimum {
                amount: amount.value(),
                minimum: self.config.min_withdrawal,
            });
        }
        non_empty(&phone, "payout phone")?;

        let withdrawal = self
            .store
            .insert_withdrawal(WithdrawalDraft {
                affiliate_id,
                amount,
                phone,
                currency: self.config.currencies.settlement(),
                requested_at: self.clock.now(),
            })
            .await?;
        info!(
            withdrawal = withdrawal.id,
            affiliate = affiliate_id,
            amount = %withdrawal.amount.value(),
            "withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Approves a pending withdrawal and debits the balance.
    pub async fn approve_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        admin: AdminId,
    ) -> Result<Withdrawal> {
        let withdrawal = self
            .store
            .approve_withdrawal(withdrawal_id, admin, self.clock.now())
            .await?;
        info!(
            withdrawal = withdrawal.id,
            affiliate = withdrawal.affiliate_id,
            admin,
            amount = %withdrawal.amount.value(),
            "withdrawal approved"
        );
        Ok(withdrawal)
    }

    /// Rejects a pending withdrawal. The balance is untouched.
    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        admin: AdminId,
    ) -> Result<Withdrawal> {
        let withdrawal = self
            .store
            .reject_withdrawal(withdrawal_id, admin, self.clock.now())
            .await?;
        info!(
            withdrawal = withdrawal.id,
            affiliate = withdrawal.affiliate_id,
            admin,
            "withdrawal rejected"
        );
        Ok(withdrawal)
    }

    // Read paths. No side effects; display-level consistency is enough here.

    pub async fn affiliate(&self, id: AffiliateId) -> Result<Option<Affiliate>> {
        self.store.affiliate(id).await
    }

    pub async fn affiliate_by_identity(&self, identity: ExternalId) -> Result<Option<Affiliate>> {
        self.store.affiliate_by_identity(identity).await
    }

    pub async fn orders_for(&self, affiliate_id: AffiliateId) -> Result<Vec<Order>> {
        self.store.orders_by_affiliate(affiliate_id).await
    }

    pub async fn withdrawals_for(&self, affiliate_id: AffiliateId) -> Result<Vec<Withdrawal>> {
        self.store.withdrawals_by_affiliate(affiliate_id).await
    }

    pub async fn pending_orders(&self) -> Result<Vec<Order>> {
        self.store.pending_orders().await
    }

    pub async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        self.store.pending_withdrawals().await
    }

    pub async fn affiliate_stats(&self, affiliate_id: AffiliateId) -> Result<AffiliateStats> {
        let affiliate = self
            .store
            .affiliate(affiliate_id)
            .await?
            .ok_or(LedgerError::AffiliateNotFound(affiliate_id))?;
        let delivered_orders = self.store.count_delivered_orders(affiliate_id).await?;
        Ok(AffiliateStats {
            affiliate,
            delivered_orders,
        })
    }

    /// All affiliates ranked by lifetime sales, best first.
    pub async fn affiliates_by_sales(&self) -> Result<Vec<Affiliate>> {
        let mut affiliates = self.store.affiliates().await?;
        affiliates.sort_by(|a, b| b.total_sales.value().cmp(&a.total_sales.value()));
        Ok(affiliates)
    }
}

fn non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(LedgerError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}
