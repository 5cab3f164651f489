use crate::application::engine::AffiliateStats;
use crate::error::Result;
use std::io::Write;

/// Writes affiliate statements as CSV, one row per affiliate.
///
/// This is the export surface of the system: the money columns are formatted
/// to two decimal places in the settlement currency.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(target: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(target),
        }
    }

    pub fn write_statements(&mut self, statements: &[AffiliateStats]) -> Result<()> {
        self.writer.write_record([
            "id",
            "name",
            "store",
            "balance",
            "total_earnings",
            "total_sales",
            "total_orders",
            "delivered_orders",
        ])?;
        for stats in statements {
            let affiliate = &stats.affiliate;
            self.writer.write_record([
                affiliate.id.to_string(),
                affiliate.name.clone(),
                affiliate.store_name.clone(),
                format!("{:.2}", affiliate.balance.value()),
                format!("{:.2}", affiliate.total_earnings.value()),
                format!("{:.2}", affiliate.total_sales.value()),
                affiliate.total_orders.to_string(),
                stats.delivered_orders.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
