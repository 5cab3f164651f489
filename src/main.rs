use affiliate_ledger::application::engine::{AffiliateEngine, OrderRequest};
use affiliate_ledger::config::Config;
use affiliate_ledger::domain::affiliate::Registration;
use affiliate_ledger::domain::currency::{CommissionPolicy, Country};
use affiliate_ledger::domain::ports::LedgerStoreBox;
use affiliate_ledger::error::{LedgerError, Result as LedgerResult};
use affiliate_ledger::infrastructure::clock::SystemClock;
use affiliate_ledger::infrastructure::in_memory::InMemoryLedger;
use affiliate_ledger::interfaces::csv::operation_reader::{
    OperationReader, OperationRecord, OperationType, valid_customer_phone, valid_payout_phone,
};
use affiliate_ledger::interfaces::csv::report_writer::ReportWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Orders one affiliate may create within a trailing minute
    #[arg(long, default_value_t = 10)]
    rate_limit: u32,

    /// Minimum withdrawal amount, settlement currency
    #[arg(long, default_value = "50")]
    min_withdrawal: Decimal,

    /// Pay this fraction of the margin as commission instead of the full margin
    #[arg(long)]
    commission_rate: Option<Decimal>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config {
        rate_limit_per_minute: cli.rate_limit,
        min_withdrawal: cli.min_withdrawal,
        commission_policy: match cli.commission_rate {
            Some(rate) => CommissionPolicy::MarginRate(rate),
            None => CommissionPolicy::Margin,
        },
        ..Config::default()
    };

    let store: LedgerStoreBox = match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => Box::new(
            affiliate_ledger::infrastructure::rocksdb::RocksDbLedger::open(db_path)
                .into_diagnostic()?,
        ),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            return Err(miette::miette!(
                "--db-path requires building with the storage-rocksdb feature"
            ));
        }
        None => Box::new(InMemoryLedger::new()),
    };

    let engine = AffiliateEngine::new(store, Box::new(SystemClock), config);

    // Apply operations one by one; a failing row is reported and skipped,
    // the way an interactive surface would show the error and move on.
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for record in reader.operations() {
        match record {
            Ok(record) => {
                if let Err(e) = apply(&engine, record).await {
                    eprintln!("Error applying operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    // Emit the affiliate statements, best sellers first.
    let mut statements = Vec::new();
    for affiliate in engine.affiliates_by_sales().await.into_diagnostic()? {
        statements.push(
            engine
                .affiliate_stats(affiliate.id)
                .await
                .into_diagnostic()?,
        );
    }

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_statements(&statements).into_diagnostic()?;

    Ok(())
}

async fn apply(engine: &AffiliateEngine, record: OperationRecord) -> LedgerResult<()> {
    match record.op {
        OperationType::Register => {
            let phone = require(record.phone, "phone")?;
            if !valid_payout_phone(&phone) {
                return Err(LedgerError::Validation(format!(
                    "invalid payout phone: {phone}"
                )));
            }
            engine
                .register_affiliate(Registration {
                    identity: require(record.identity, "identity")?,
                    name: require(record.name, "name")?,
                    phone,
                    store_name: require(record.store, "store")?,
                })
                .await?;
        }
        OperationType::Order => {
            let country = Country::parse(&require(record.country, "country")?)?;
            let customer_phone = require(record.customer_phone, "customer_phone")?;
            if !valid_customer_phone(&customer_phone, country) {
                return Err(LedgerError::Validation(format!(
                    "invalid customer phone for {country}: {customer_phone}"
                )));
            }
            engine
                .create_order(
                    require(record.affiliate, "affiliate")?,
                    OrderRequest {
                        customer_name: require(record.customer, "customer")?,
                        customer_phone,
                        address: require(record.address, "address")?,
                        city: require(record.city, "city")?,
                        country,
                        product: require(record.product, "product")?,
                        product_code: require(record.product_code, "product_code")?,
                        cost_price: require(record.cost_price, "cost_price")?,
                        selling_price: require(record.selling_price, "selling_price")?,
                    },
                )
                .await?;
        }
        OperationType::Delivered => {
            engine
                .mark_delivered(require(record.target, "target")?)
                .await?;
        }
        OperationType::Issue => {
            engine.mark_issue(require(record.target, "target")?).await?;
        }
        OperationType::Withdraw => {
            let phone = require(record.phone, "phone")?;
            if !valid_payout_phone(&phone) {
                return Err(LedgerError::Validation(format!(
                    "invalid payout phone: {phone}"
                )));
            }
            engine
                .request_withdrawal(
                    require(record.affiliate, "affiliate")?,
                    require(record.amount, "amount")?,
                    phone,
                )
                .await?;
        }
        OperationType::Approve => {
            engine
                .approve_withdrawal(
                    require(record.target, "target")?,
                    require(record.admin, "admin")?,
                )
                .await?;
        }
        OperationType::Reject => {
            engine
                .reject_withdrawal(
                    require(record.target, "target")?,
                    require(record.admin, "admin")?,
                )
                .await?;
        }
    }
    Ok(())
}

fn require<T>(value: Option<T>, field: &str) -> LedgerResult<T> {
    value.ok_or_else(|| LedgerError::Validation(format!("missing field: {field}")))
}
