use crate::domain::affiliate::AffiliateId;
use crate::domain::ports::LedgerStore;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};

/// Bounds how many orders one affiliate may create within the trailing
/// 60-second window.
///
/// This is a read-only check against persisted order history; it does not
/// reserve a slot. Callers re-run it inside the operation that creates the
/// order, which narrows but does not close the race window — a heavy
/// concurrent burst can land slightly above the ceiling.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    per_minute: u32,
}

impl RateLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self { per_minute }
    }

    /// Whether the affiliate may create another order right now.
    pub async fn allow_order(
        &self,
        store: &dyn LedgerStore,
        affiliate_id: AffiliateId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let since = now - Duration::seconds(60);
        let recent = store.count_orders_since(affiliate_id, since).await?;
        Ok(recent < u64::from(self.per_minute))
    }
}
