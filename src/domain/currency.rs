use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Countries the merchant ships to. Each one fixes the local currency
/// an order is priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    SaudiArabia,
    Uae,
}

impl Country {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "Saudi Arabia" => Ok(Self::SaudiArabia),
            "UAE" => Ok(Self::Uae),
            other => Err(LedgerError::Validation(format!(
                "unsupported country: {other}"
            ))),
        }
    }

    /// The local currency orders from this country are priced in.
    pub fn currency(self) -> Currency {
        match self {
            Self::SaudiArabia => Currency::Sar,
            Self::Uae => Currency::Aed,
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaudiArabia => write!(f, "Saudi Arabia"),
            Self::Uae => write!(f, "UAE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Sar,
    Aed,
    Usd,
}

impl Currency {
    pub fn parse(code: &str) -> Result<Self> {
        match code.trim() {
            "SAR" => Ok(Self::Sar),
            "AED" => Ok(Self::Aed),
            "USD" => Ok(Self::Usd),
            other => Err(LedgerError::UnknownCurrency(other.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Sar => "SAR",
            Self::Aed => "AED",
            Self::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Static conversion rates into the settlement currency.
///
/// Built once at startup as part of the process configuration and treated as
/// immutable afterwards. The settlement currency always converts through the
/// identity rate; any other currency missing from the table is an error, not
/// a silent pass-through.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    settlement: Currency,
    rates: HashMap<Currency, Decimal>,
}

impl CurrencyTable {
    pub fn new(settlement: Currency) -> Self {
        Self {
            settlement,
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, currency: Currency, rate: Decimal) -> Self {
        self.rates.insert(currency, rate);
        self
    }

    pub fn settlement(&self) -> Currency {
        self.settlement
    }

    /// Converts a local-currency amount into the settlement currency.
    pub fn to_settlement(&self, amount: Decimal, currency: Currency) -> Result<Decimal> {
        if currency == self.settlement {
            return Ok(amount);
        }
        match self.rates.get(&currency) {
            Some(rate) => Ok(amount * rate),
            None => Err(LedgerError::UnknownCurrency(currency.code().to_string())),
        }
    }
}

impl Default for CurrencyTable {
    /// USD settlement with the deployed SAR/AED rates.
    fn default() -> Self {
        Self::new(Currency::Usd)
            .with_rate(Currency::Sar, dec!(0.2665))
            .with_rate(Currency::Aed, dec!(0.2723))
    }
}

/// How an order's commission is derived from its prices.
///
/// A deployment parameter, never inferred: `Margin` pays the full difference
/// between selling and cost price, `MarginRate` pays a fraction of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommissionPolicy {
    Margin,
    MarginRate(Decimal),
}

impl CommissionPolicy {
    /// Commission in the order's local currency. Callers guarantee
    /// `selling_price > cost_price`.
    pub fn commission(&self, cost_price: Decimal, selling_price: Decimal) -> Decimal {
        let margin = selling_price - cost_price;
        match self {
            Self::Margin => margin,
            Self::MarginRate(rate) => margin * rate,
        }
    }
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self::Margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_currency_mapping() {
        assert_eq!(Country::SaudiArabia.currency(), Currency::Sar);
        assert_eq!(Country::Uae.currency(), Currency::Aed);
    }

    #[test]
    fn test_country_parse() {
        assert_eq!(Country::parse("Saudi Arabia").unwrap(), Country::SaudiArabia);
        assert_eq!(Country::parse(" UAE ").unwrap(), Country::Uae);
        assert!(matches!(
            Country::parse("Atlantis"),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_settlement_identity_rate() {
        let table = CurrencyTable::default();
        assert_eq!(
            table.to_settlement(dec!(42.50), Currency::Usd).unwrap(),
            dec!(42.50)
        );
    }

    #[test]
    fn test_local_currency_conversion() {
        let table = CurrencyTable::default();
        assert_eq!(
            table.to_settlement(dec!(150), Currency::Sar).unwrap(),
            dec!(39.9750)
        );
        assert_eq!(
            table.to_settlement(dec!(100), Currency::Aed).unwrap(),
            dec!(27.23)
        );
    }

    #[test]
    fn test_missing_rate_is_an_error() {
        let table = CurrencyTable::new(Currency::Usd).with_rate(Currency::Sar, dec!(0.27));
        assert!(matches!(
            table.to_settlement(dec!(1), Currency::Aed),
            Err(LedgerError::UnknownCurrency(code)) if code == "AED"
        ));
    }

    #[test]
    fn test_currency_parse_rejects_unknown_codes() {
        assert!(matches!(
            Currency::parse("EGP"),
            Err(LedgerError::UnknownCurrency(code)) if code == "EGP"
        ));
    }

    #[test]
    fn test_commission_policies() {
        assert_eq!(
            CommissionPolicy::Margin.commission(dec!(100), dec!(150)),
            dec!(50)
        );
        assert_eq!(
            CommissionPolicy::MarginRate(dec!(0.4)).commission(dec!(100), dec!(150)),
            dec!(20.0)
        );
    }
}
