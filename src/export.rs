// 📤 Export - filtered records as spreadsheet-ready CSV

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::record_set::RecordSet;

/// UTF-8 byte order mark; lets spreadsheet tools detect the encoding of
/// non-ASCII names.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize `records` as CSV bytes with a header row.
pub fn export_csv(records: &RecordSet) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(UTF8_BOM.to_vec());

    for record in records {
        wtr.serialize(record)
            .context("Failed to serialize sales record")?;
    }

    // An empty set still gets its header row
    if records.is_empty() {
        wtr.write_record(["date", "representative", "region", "category", "product", "amount"])?;
    }

    wtr.into_inner().context("Failed to flush CSV export")
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("sales_details_{}.csv", date.format("%Y%m%d"))
}
