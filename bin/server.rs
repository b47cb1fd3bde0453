// Sales Dashboard - Web Server
// JSON API over the cached sales snapshot

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use sales_dashboard::config::Config;
use sales_dashboard::{
    build_dashboard, export_csv, export_file_name, forecast_sales, load_config,
    representative_report, sales_history, select_groups, DailyTotal, DashboardFilter, DashboardReport,
    ForecastOutcome, QueryResolver, RecordSet, RepresentativeReport, SalesRecord, Snapshot,
    SnapshotCache, SqliteStore, TrendForecaster,
};

#[derive(Parser)]
#[command(name = "sales-server", version, about = "JSON API over the sales dashboard")]
struct Args {
    /// Configuration file (defaults to ./sales-dashboard.toml, then built-ins)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    cache: Arc<Mutex<SnapshotCache<SqliteStore>>>,
    resolver: Arc<QueryResolver>,
    config: Arc<Config>,
}

impl AppState {
    fn cache(&self) -> MutexGuard<'_, SnapshotCache<SqliteStore>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.cache().get()
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_id: Option<Uuid>,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            snapshot_id: None,
            data,
            error: None,
        }
    }

    fn from_snapshot(snapshot: &Snapshot, data: T) -> Self {
        Self {
            snapshot_id: Some(snapshot.id),
            ..Self::ok(data)
        }
    }

    fn fail(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            snapshot_id: None,
            data,
            error: Some(error.into()),
        }
    }
}

/// Query string shared by the record, dashboard and export endpoints.
/// Lists are comma separated.
#[derive(Debug, Default, Deserialize)]
struct SelectionParams {
    date: Option<NaiveDate>,
    reps: Option<String>,
    categories: Option<String>,
}

fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|s| {
        s.split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    })
}

impl SelectionParams {
    /// Day-bound selection; without a date the latest day is used.
    fn to_filter(&self, records: &RecordSet) -> Option<DashboardFilter> {
        let mut filter = match self.date {
            Some(date) => DashboardFilter::for_date(date),
            None => DashboardFilter::latest(records)?,
        };
        filter.representatives = split_list(self.reps.as_deref());
        filter.categories = split_list(self.categories.as_deref());
        Some(filter)
    }

    /// Record selection; without a date every day is kept.
    fn select(&self, records: &RecordSet) -> RecordSet {
        let days = match self.date {
            Some(date) => records.on_date(date),
            None => records.clone(),
        };
        select_groups(
            &days,
            split_list(self.reps.as_deref()).as_deref(),
            split_list(self.categories.as_deref()).as_deref(),
        )
    }
}

fn no_data<T: Serialize>(data: T) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::fail(data, "No sales data available")),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/records - Selected records (every day when no date is given)
async fn get_records(
    State(state): State<AppState>,
    Query(params): Query<SelectionParams>,
) -> impl IntoResponse {
    let snapshot = state.snapshot();

    let data: Vec<SalesRecord> = params.select(&snapshot.records).records().to_vec();
    (StatusCode::OK, Json(ApiResponse::from_snapshot(&snapshot, data))).into_response()
}

/// GET /api/dashboard - KPIs, rankings and breakdowns for a day
async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<SelectionParams>,
) -> impl IntoResponse {
    let snapshot = state.snapshot();

    let Some(filter) = params.to_filter(&snapshot.records) else {
        return no_data(Option::<DashboardReport>::None);
    };

    let report = build_dashboard(&snapshot.records, &filter, &state.config.dashboard);
    (StatusCode::OK, Json(ApiResponse::from_snapshot(&snapshot, report))).into_response()
}

#[derive(Deserialize)]
struct AskRequest {
    query: String,
}

#[derive(Serialize)]
struct AskResponse {
    query: String,
    answer: String,
}

/// POST /api/ask - Answer a free-text question
async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    let answer = state.resolver.answer(&request.query, &snapshot.records);

    info!(query = %request.query, "question answered");

    Json(ApiResponse::from_snapshot(
        &snapshot,
        AskResponse {
            query: request.query,
            answer,
        },
    ))
}

/// GET /api/reps/:name - Report for one representative
async fn get_rep_report(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let snapshot = state.snapshot();

    // Decode URL-encoded name
    let decoded_name = urlencoding::decode(&name)
        .unwrap_or_else(|_| name.clone().into())
        .into_owned();

    match representative_report(&snapshot.records, &decoded_name) {
        Some(report) => {
            (StatusCode::OK, Json(ApiResponse::from_snapshot(&snapshot, Some(report)))).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::fail(
                Option::<RepresentativeReport>::None,
                format!("No records found for representative {}", decoded_name),
            )),
        )
            .into_response(),
    }
}

/// GET /api/history - Total sales per day
async fn get_history(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    let history: Vec<DailyTotal> = sales_history(&snapshot.records);
    Json(ApiResponse::from_snapshot(&snapshot, history))
}

#[derive(Deserialize)]
struct ForecastParams {
    date: Option<NaiveDate>,
}

/// GET /api/forecast - Projection from the history up to a date
async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastParams>,
) -> impl IntoResponse {
    let snapshot = state.snapshot();

    let as_of = params
        .date
        .or_else(|| snapshot.records.date_range().map(|(_, max)| max));
    let Some(as_of) = as_of else {
        return no_data(Option::<ForecastOutcome>::None);
    };

    let forecaster = TrendForecaster::new(state.config.forecast.interval_width);
    match forecast_sales(&snapshot.records, as_of, &forecaster, &state.config.forecast) {
        Ok(outcome) => {
            (StatusCode::OK, Json(ApiResponse::from_snapshot(&snapshot, Some(outcome)))).into_response()
        }
        Err(e) => {
            error!("Error forecasting sales: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(Option::<ForecastOutcome>::None, e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/export - Selected records as a CSV download
async fn export_records(
    State(state): State<AppState>,
    Query(params): Query<SelectionParams>,
) -> Response {
    let snapshot = state.snapshot();

    let Some(filter) = params.to_filter(&snapshot.records) else {
        return no_data(());
    };

    match export_csv(&filter.apply(&snapshot.records)) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export_file_name(filter.date)),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Error exporting records: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail((), e.to_string())),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
struct RefreshResponse {
    records: usize,
    loaded_at: chrono::DateTime<chrono::Utc>,
}

/// POST /api/refresh - Reload the snapshot now
async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache().refresh();
    Json(ApiResponse::from_snapshot(
        &snapshot,
        RefreshResponse {
            records: snapshot.records.len(),
            loaded_at: snapshot.loaded_at,
        },
    ))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/records", get(get_records))
        .route("/dashboard", get(get_dashboard))
        .route("/ask", post(ask))
        .route("/reps/:name", get(get_rep_report))
        .route("/history", get(get_history))
        .route("/forecast", get(get_forecast))
        .route("/export", get(export_records))
        .route("/refresh", post(refresh))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sales_dashboard::init_logging();

    println!("🌐 Sales Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let store = SqliteStore::new(&config.database.path);
    if !store.path().exists() {
        eprintln!("⚠️  Database not found at {:?}", store.path());
        eprintln!("   Run: sales-dashboard import <file.csv>");
        eprintln!("   Serving empty data until it appears.");
    }

    let mut cache = SnapshotCache::with_ttl_seconds(store, config.cache.ttl_seconds);
    let snapshot = cache.get();
    println!("✓ Loaded {} records", snapshot.records.len());

    let bind = config.server.bind.clone();
    let state = AppState {
        cache: Arc::new(Mutex::new(cache)),
        resolver: Arc::new(QueryResolver::new(config.query.clone())),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&bind).await?;

    println!("\n🚀 Server running on http://{}", bind);
    println!("   API: http://{}/api/dashboard", bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
