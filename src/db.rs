// 🗄️ Record Store - SQLite-backed sales table
// One row per transaction. The table is replaced wholesale on import and is
// read-only for everything else in the crate.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::record_set::RecordSet;

/// One sales transaction.
///
/// Accepts both the plain English column names and the bilingual headers
/// produced by the spreadsheet source (`日期 (Date)`, `销售代表 (Rep)`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(alias = "日期 (Date)", alias = "Date")]
    pub date: NaiveDate,

    #[serde(alias = "销售代表 (Rep)", alias = "Rep")]
    pub representative: String,

    #[serde(alias = "销售区域 (Region)", alias = "Region")]
    pub region: String,

    #[serde(alias = "产品大类 (Category)", alias = "Category")]
    pub category: String,

    #[serde(alias = "产品名称 (Product)", alias = "Product")]
    pub product: String,

    #[serde(alias = "销售额 (Sales)", alias = "Sales", alias = "Amount")]
    pub amount: f64,
}

impl SalesRecord {
    pub fn new(
        date: NaiveDate,
        representative: &str,
        region: &str,
        category: &str,
        product: &str,
        amount: f64,
    ) -> Self {
        SalesRecord {
            date,
            representative: representative.to_string(),
            region: region.to_string(),
            category: category.to_string(),
            product: product.to_string(),
            amount,
        }
    }
}

/// Parse a stored date. Accepts `YYYY-MM-DD` with an optional time suffix
/// (`YYYY-MM-DD HH:MM:SS` or RFC 3339), which is dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            representative TEXT NOT NULL,
            region TEXT NOT NULL,
            category TEXT NOT NULL,
            product TEXT NOT NULL,
            amount REAL NOT NULL
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(date)", [])?;

    Ok(())
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<SalesRecord>> {
    let bytes = std::fs::read(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body);

    let mut records = Vec::new();

    for (i, result) in rdr.deserialize().enumerate() {
        let record: SalesRecord =
            result.with_context(|| format!("Failed to deserialize sales row {}", i + 1))?;
        records.push(record);
    }

    Ok(records)
}

/// Replace the whole `sales` table with `records` in one transaction.
pub fn replace_records(conn: &mut Connection, records: &[SalesRecord]) -> Result<usize> {
    let tx = conn.transaction()?;

    let removed = tx.execute("DELETE FROM sales", [])?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO sales (date, representative, region, category, product, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for record in records {
            stmt.execute(params![
                record.date.format("%Y-%m-%d").to_string(),
                record.representative,
                record.region,
                record.category,
                record.product,
                record.amount,
            ])?;
        }
    }

    tx.commit()?;

    info!(removed, inserted = records.len(), "sales table replaced");

    Ok(records.len())
}

pub fn get_all_records(conn: &Connection) -> Result<Vec<SalesRecord>> {
    let mut stmt = conn.prepare(
        "SELECT date, representative, region, category, product, amount
         FROM sales
         ORDER BY id",
    )?;

    let records = stmt
        .query_map([], |row| {
            let date_str: String = row.get(0)?;
            let date = parse_date(&date_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("invalid date: {}", date_str).into(),
                )
            })?;

            Ok(SalesRecord {
                date,
                representative: row.get(1)?,
                region: row.get(2)?,
                category: row.get(3)?,
                product: row.get(4)?,
                amount: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// RECORD STORE ADAPTER
// ============================================================================

/// Source of the full record set.
///
/// Implementations never fail: a missing or malformed store yields an empty
/// `RecordSet`, which callers treat as "no data".
pub trait RecordStore {
    fn load_all(&self) -> RecordSet;
}

/// Reads the `sales` table of a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        SqliteStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> Result<Vec<SalesRecord>> {
        if !self.path.exists() {
            anyhow::bail!("database not found at {:?}", self.path);
        }

        let conn = Connection::open(&self.path)
            .with_context(|| format!("Failed to open database: {:?}", self.path))?;

        get_all_records(&conn).context("Failed to read sales table")
    }
}

impl RecordStore for SqliteStore {
    fn load_all(&self) -> RecordSet {
        match self.try_load() {
            Ok(records) => {
                info!(count = records.len(), path = ?self.path, "loaded sales records");
                RecordSet::new(records)
            }
            Err(e) => {
                warn!(error = %e, "failed to load sales records, serving empty set");
                RecordSet::empty()
            }
        }
    }
}
