use crate::domain::currency::Country;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Register,
    Order,
    Delivered,
    Issue,
    Withdraw,
    Approve,
    Reject,
}

/// One row of the operation stream fed to the replay binary.
///
/// The collector surface normally gathers these fields turn by turn; here a
/// row carries the already-collected set, with the columns an operation does
/// not use left empty.
#[derive(Debug, Deserialize, Clone)]
pub struct OperationRecord {
    pub op: OperationType,
    #[serde(default)]
    pub identity: Option<i64>,
    #[serde(default)]
    pub affiliate: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub target: Option<u64>,
    #[serde(default)]
    pub admin: Option<i64>,
}

/// Reads operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<OperationRecord>`. It handles whitespace trimming and flexible
/// record lengths automatically.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations.
    pub fn operations(self) -> impl Iterator<Item = Result<OperationRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}

/// Payout numbers are Egyptian: `+20` followed by 10 digits.
pub fn valid_payout_phone(phone: &str) -> bool {
    phone
        .strip_prefix("+20")
        .is_some_and(|rest| all_digits(rest, 10))
}

/// Customer numbers follow the destination country: `+966` for Saudi Arabia,
/// `+971` for the UAE, each followed by 9 digits.
pub fn valid_customer_phone(phone: &str, country: Country) -> bool {
    let prefix = match country {
        Country::SaudiArabia => "+966",
        Country::Uae => "+971",
    };
    phone
        .strip_prefix(prefix)
        .is_some_and(|rest| all_digits(rest, 9))
}

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}
