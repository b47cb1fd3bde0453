// Sales Dashboard - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod record_set;
pub mod metrics;    // Totals, rankings, growth, Pareto
pub mod query;      // Keyword question answering
pub mod cache;      // TTL snapshot of the full record set
pub mod forecast;
pub mod dashboard;  // Daily view orchestration
pub mod export;
pub mod format;
pub mod config;

// Re-export commonly used types
pub use db::{
    SalesRecord, RecordStore, SqliteStore,
    load_csv, setup_database, replace_records, get_all_records, verify_count,
};
pub use record_set::{
    RecordSet, GroupField, DailyTotal, normalize_name,
};
pub use metrics::{
    GroupTotal, ParetoContribution,
    total_sales, order_count, average_order_value, top_n, growth_rate, pareto_contribution,
};
pub use query::{
    QueryResolver, Answer, EntityCatalog, MatchedEntities, RepresentativeReport,
    extract_entities, normalize_query, representative_report, spelled_name,
};
pub use cache::{
    Snapshot, SnapshotCache,
};
pub use forecast::{
    Forecaster, ForecastPoint, TrendForecaster,
};
pub use dashboard::{
    DashboardFilter, DashboardReport, Kpis, ParetoSummary, ForecastOutcome,
    build_dashboard, select_groups, sales_history, forecast_sales,
};
pub use export::{
    export_csv, export_file_name,
};
pub use config::{
    Config, load_config,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the `tracing` subscriber used by both binaries.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore the error when a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
