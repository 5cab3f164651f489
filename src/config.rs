use crate::domain::currency::{CommissionPolicy, CurrencyTable};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Process-wide knobs, constructed once at startup and passed explicitly to
/// the engine. Immutable for the process lifetime; there is no hot reload.
#[derive(Debug, Clone)]
pub struct Config {
    /// Orders one affiliate may create within a trailing 60-second window.
    pub rate_limit_per_minute: u32,
    /// Smallest withdrawal amount accepted, settlement currency.
    pub min_withdrawal: Decimal,
    pub commission_policy: CommissionPolicy,
    pub currencies: CurrencyTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 10,
            min_withdrawal: dec!(50.0),
            commission_policy: CommissionPolicy::default(),
            currencies: CurrencyTable::default(),
        }
    }
}
