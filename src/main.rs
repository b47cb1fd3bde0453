use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use sales_dashboard::config::Config;
use sales_dashboard::format::format_currency;
use sales_dashboard::{
    build_dashboard, export_csv, export_file_name, forecast_sales, load_config, load_csv,
    replace_records, sales_history, setup_database, verify_count, DashboardFilter, QueryResolver,
    RecordSet, RecordStore, SqliteStore, TrendForecaster,
};

#[derive(Parser)]
#[command(name = "sales-dashboard", version, about = "Daily sales dashboard and Q&A")]
struct Cli {
    /// Configuration file (defaults to ./sales-dashboard.toml, then built-ins)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the database path from the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the sales table with the contents of a CSV file
    Import { csv: PathBuf },

    /// KPIs, rankings and breakdowns for one day
    Dashboard {
        #[command(flatten)]
        selection: Selection,
    },

    /// Ask a question, e.g. "How much did Alice sell in the East?"
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },

    /// Total sales per day
    History,

    /// Project daily sales from the history up to a date
    Forecast {
        /// Last day of history to use (defaults to the latest day)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Write the selected day's records as CSV
    Export {
        #[command(flatten)]
        selection: Selection,

        /// Output file (defaults to sales_details_YYYYMMDD.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct Selection {
    /// Day to show (defaults to the latest day)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Representatives to include (repeatable; default all)
    #[arg(long = "rep")]
    reps: Vec<String>,

    /// Categories to include (repeatable; default all)
    #[arg(long = "category")]
    categories: Vec<String>,
}

impl Selection {
    fn to_filter(&self, records: &RecordSet) -> Option<DashboardFilter> {
        let mut filter = match self.date {
            Some(date) => DashboardFilter::for_date(date),
            None => DashboardFilter::latest(records)?,
        };
        if !self.reps.is_empty() {
            filter = filter.with_representatives(self.reps.clone());
        }
        if !self.categories.is_empty() {
            filter = filter.with_categories(self.categories.clone());
        }
        Some(filter)
    }
}

fn main() -> Result<()> {
    sales_dashboard::init_logging();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    match cli.command {
        Command::Import { csv } => run_import(&config, &csv),
        Command::Dashboard { selection } => run_dashboard(&config, &selection),
        Command::Ask { question } => run_ask(&config, &question.join(" ")),
        Command::History => run_history(&config),
        Command::Forecast { date } => run_forecast(&config, date),
        Command::Export { selection, out } => run_export(&config, &selection, out),
    }
}

/// Load the full record set, or explain how to get data in.
fn load_records(config: &Config) -> Option<RecordSet> {
    let records = SqliteStore::new(&config.database.path).load_all();
    if records.is_empty() {
        eprintln!("❌ No sales data found in {:?}", config.database.path);
        eprintln!("   Run: sales-dashboard import <file.csv>");
        eprintln!("   to load records first.");
        return None;
    }
    Some(records)
}

fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    println!("🗄️  Data Import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading CSV...");
    let records = load_csv(csv_path)?;
    println!("✓ Loaded {} records from {:?}", records.len(), csv_path);

    println!("\n🔧 Setting up database...");
    let mut conn = Connection::open(&config.database.path)
        .with_context(|| format!("Failed to open database: {:?}", config.database.path))?;
    setup_database(&conn)?;
    println!("✓ Database ready at {:?}", config.database.path);

    println!("\n💾 Replacing sales table...");
    let inserted = replace_records(&mut conn, &records)?;

    let count = verify_count(&conn)?;
    println!("✓ Database contains {} records", count);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if count == inserted as i64 {
        println!("✅ Import complete");
    } else {
        println!("⚠️  Expected {} records, found {}", inserted, count);
    }

    Ok(())
}

fn run_dashboard(config: &Config, selection: &Selection) -> Result<()> {
    let Some(records) = load_records(config) else {
        return Ok(());
    };
    let Some(filter) = selection.to_filter(&records) else {
        return Ok(());
    };
    let symbol = &config.query.currency_symbol;

    println!("📊 Sales Dashboard - {}", filter.date);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let Some(report) = build_dashboard(&records, &filter, &config.dashboard) else {
        println!("⚠️  No sales data for {} under the current filter.", filter.date);
        return Ok(());
    };

    let k = &report.kpis;
    println!(
        "Total sales:        {}  ({:+.2}% vs previous day, all reps)",
        format_currency(symbol, k.total_sales),
        k.daily_growth_pct
    );
    println!("                    {:+.2}% vs same day last week", k.weekly_growth_pct);
    println!("Orders:             {}", k.order_count);
    println!("Average order:      {}", format_currency(symbol, k.average_order_value));

    println!("\n🏆 Top {} representatives", config.dashboard.top_n);
    for (i, g) in report.top_representatives.iter().enumerate() {
        println!("  {:>2}. {:<20} {}", i + 1, g.label, format_currency(symbol, g.total));
    }

    println!("\n🚀 Top {} products", config.dashboard.top_n);
    for (i, g) in report.top_products.iter().enumerate() {
        println!("  {:>2}. {:<20} {}", i + 1, g.label, format_currency(symbol, g.total));
    }

    println!("\n🌏 By region");
    for g in &report.by_region {
        println!("  {:<24} {}", g.label, format_currency(symbol, g.total));
    }

    println!("\n📦 By category");
    for g in &report.by_category {
        println!("  {:<24} {}", g.label, format_currency(symbol, g.total));
    }

    println!("\n📐 {}", report.pareto.narrative());

    Ok(())
}

fn run_ask(config: &Config, question: &str) -> Result<()> {
    let Some(records) = load_records(config) else {
        return Ok(());
    };

    let resolver = QueryResolver::new(config.query.clone());
    println!("Q: {}\n", question);
    println!("A:\n{}", resolver.answer(question, &records));

    Ok(())
}

fn run_history(config: &Config) -> Result<()> {
    let Some(records) = load_records(config) else {
        return Ok(());
    };

    println!("📈 Daily sales history");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for day in sales_history(&records) {
        println!(
            "{}  {}",
            day.date,
            format_currency(&config.query.currency_symbol, day.total)
        );
    }

    Ok(())
}

fn run_forecast(config: &Config, date: Option<NaiveDate>) -> Result<()> {
    let Some(records) = load_records(config) else {
        return Ok(());
    };
    let Some(as_of) = date.or_else(|| records.date_range().map(|(_, max)| max)) else {
        return Ok(());
    };

    let forecaster = TrendForecaster::new(config.forecast.interval_width);
    let outcome = forecast_sales(&records, as_of, &forecaster, &config.forecast)?;

    println!(
        "🔮 {}-day sales forecast from {} days of history (as of {})",
        config.forecast.horizon_days, outcome.history_days, as_of
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if let Some(warning) = &outcome.warning {
        println!("⚠️  {}", warning);
    }

    println!(
        "{:<12} {:>16} {:>16} {:>16}",
        "date",
        "estimate",
        format!("lower ({:.0}%)", config.forecast.interval_width * 100.0),
        format!("upper ({:.0}%)", config.forecast.interval_width * 100.0),
    );
    for p in &outcome.points {
        println!(
            "{:<12} {:>16.2} {:>16.2} {:>16.2}",
            p.date.to_string(),
            p.estimate,
            p.lower,
            p.upper
        );
    }

    Ok(())
}

fn run_export(config: &Config, selection: &Selection, out: Option<PathBuf>) -> Result<()> {
    let Some(records) = load_records(config) else {
        return Ok(());
    };
    let Some(filter) = selection.to_filter(&records) else {
        return Ok(());
    };

    let selected = filter.apply(&records);
    let bytes = export_csv(&selected)?;
    let path = out.unwrap_or_else(|| PathBuf::from(export_file_name(filter.date)));

    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    println!("📄 Exported {} records to {:?}", selected.len(), path);

    Ok(())
}
