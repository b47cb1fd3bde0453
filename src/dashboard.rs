// 📈 Dashboard - one day's KPIs, rankings and concentration
//
// Builds the daily view from the full record set:
//   selection = records on `date` for the chosen representatives/categories
//   growth    = selection total vs the FULL previous day / same day last week

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{DashboardConfig, ForecastConfig};
use crate::forecast::{ForecastPoint, Forecaster};
use crate::metrics::{
    average_order_value, group_totals, growth_rate, order_count, pareto_contribution, top_n,
    total_sales, GroupTotal, ParetoContribution,
};
use crate::record_set::{DailyTotal, GroupField, RecordSet};

// ============================================================================
// FILTER
// ============================================================================

/// Day plus optional representative/category selections (`None` = all).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub date: NaiveDate,
    #[serde(default)]
    pub representatives: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

impl DashboardFilter {
    pub fn for_date(date: NaiveDate) -> Self {
        DashboardFilter {
            date,
            representatives: None,
            categories: None,
        }
    }

    /// Filter on the most recent day in `records`.
    pub fn latest(records: &RecordSet) -> Option<Self> {
        records.date_range().map(|(_, max)| Self::for_date(max))
    }

    pub fn with_representatives(mut self, reps: Vec<String>) -> Self {
        self.representatives = Some(reps);
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn apply(&self, records: &RecordSet) -> RecordSet {
        select_groups(
            &records.on_date(self.date),
            self.representatives.as_deref(),
            self.categories.as_deref(),
        )
    }
}

/// Representative/category part of a selection, on any span of days.
pub fn select_groups(
    records: &RecordSet,
    representatives: Option<&[String]>,
    categories: Option<&[String]>,
) -> RecordSet {
    let mut selected = records.clone();
    if let Some(reps) = representatives {
        selected = selected.with_values(GroupField::Representative, reps);
    }
    if let Some(categories) = categories {
        selected = selected.with_values(GroupField::Category, categories);
    }
    selected
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub order_count: usize,
    pub average_order_value: f64,
    /// Unfiltered total of the previous day
    pub previous_day_total: f64,
    pub daily_growth_pct: f64,
    /// Unfiltered total of the same weekday one week earlier
    pub last_week_total: f64,
    pub weekly_growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoSummary {
    pub fraction: f64,
    #[serde(flatten)]
    pub contribution: ParetoContribution,
}

impl ParetoSummary {
    pub fn narrative(&self) -> String {
        match self.contribution.contribution_percentage {
            Some(pct) => format!(
                "The top {:.0}% of representatives ({}) contributed {:.2}% of sales.",
                self.fraction * 100.0,
                self.contribution.contributors.join(", "),
                pct
            ),
            None => "No sales under the current filter, contribution analysis unavailable."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub filter: DashboardFilter,
    pub kpis: Kpis,
    pub top_representatives: Vec<GroupTotal>,
    pub top_products: Vec<GroupTotal>,
    pub pareto: ParetoSummary,
    pub by_region: Vec<GroupTotal>,
    pub by_category: Vec<GroupTotal>,
}

/// Build the daily report. `None` when the filter selects no records.
pub fn build_dashboard(
    all: &RecordSet,
    filter: &DashboardFilter,
    config: &DashboardConfig,
) -> Option<DashboardReport> {
    let selected = filter.apply(all);
    if selected.is_empty() {
        return None;
    }

    let current = total_sales(&selected);
    let previous_day_total = total_sales(&all.on_date(filter.date - Duration::days(1)));
    let last_week_total = total_sales(&all.on_date(filter.date - Duration::days(7)));

    let kpis = Kpis {
        total_sales: current,
        order_count: order_count(&selected),
        average_order_value: average_order_value(&selected),
        previous_day_total,
        daily_growth_pct: growth_rate(current, previous_day_total),
        last_week_total,
        weekly_growth_pct: growth_rate(current, last_week_total),
    };

    Some(DashboardReport {
        filter: filter.clone(),
        kpis,
        top_representatives: top_n(&selected, GroupField::Representative, config.top_n),
        top_products: top_n(&selected, GroupField::Product, config.top_n),
        pareto: ParetoSummary {
            fraction: config.pareto_fraction,
            contribution: pareto_contribution(
                &selected,
                GroupField::Representative,
                config.pareto_fraction,
            ),
        },
        by_region: group_totals(&selected, GroupField::Region),
        by_category: group_totals(&selected, GroupField::Category),
    })
}

// ============================================================================
// HISTORY & FORECAST
// ============================================================================

/// Daily totals over the whole corpus.
pub fn sales_history(all: &RecordSet) -> Vec<DailyTotal> {
    all.daily_totals()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub history_days: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub points: Vec<ForecastPoint>,
}

/// Forecast from the daily totals up to and including `as_of`.
///
/// Short history only adds a warning; the forecaster still runs.
pub fn forecast_sales<F: Forecaster>(
    all: &RecordSet,
    as_of: NaiveDate,
    forecaster: &F,
    config: &ForecastConfig,
) -> anyhow::Result<ForecastOutcome> {
    let history = all.up_to(as_of).daily_totals();

    let warning = if history.len() < config.min_history_days {
        let message = format!(
            "Only {} days of history (fewer than {}); the forecast may be inaccurate.",
            history.len(),
            config.min_history_days
        );
        warn!("{}", message);
        Some(message)
    } else {
        None
    };

    let points = forecaster.forecast(&history, config.horizon_days)?;

    Ok(ForecastOutcome {
        history_days: history.len(),
        warning,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SalesRecord;
    use crate::forecast::TrendForecaster;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn create_test_record(d: u32, rep: &str, category: &str, product: &str, amount: f64) -> SalesRecord {
        SalesRecord::new(day(d), rep, "East", category, product, amount)
    }

    fn sample() -> RecordSet {
        RecordSet::new(vec![
            // a week before
            create_test_record(1, "Alice", "Tools", "Hammer", 200.0),
            // previous day
            create_test_record(7, "Alice", "Tools", "Hammer", 100.0),
            create_test_record(7, "Bob", "Paint", "Brush", 100.0),
            // selected day
            create_test_record(8, "Alice", "Tools", "Hammer", 120.0),
            create_test_record(8, "Alice", "Tools", "Drill", 80.0),
            create_test_record(8, "Bob", "Paint", "Brush", 60.0),
            create_test_record(8, "Carol", "Tools", "Saw", 40.0),
        ])
    }

    #[test]
    fn test_latest_filter_uses_max_date() {
        assert_eq!(DashboardFilter::latest(&sample()).unwrap().date, day(8));
        assert_eq!(DashboardFilter::latest(&RecordSet::empty()), None);
    }

    #[test]
    fn test_kpis_and_growth() {
        let report =
            build_dashboard(&sample(), &DashboardFilter::for_date(day(8)), &DashboardConfig::default())
                .unwrap();

        assert_eq!(report.kpis.total_sales, 300.0);
        assert_eq!(report.kpis.order_count, 4);
        assert_eq!(report.kpis.average_order_value, 75.0);
        assert_eq!(report.kpis.previous_day_total, 200.0);
        assert_eq!(report.kpis.daily_growth_pct, 50.0);
        assert_eq!(report.kpis.last_week_total, 200.0);
        assert_eq!(report.kpis.weekly_growth_pct, 50.0);
    }

    #[test]
    fn test_growth_baseline_ignores_filter() {
        let filter = DashboardFilter::for_date(day(8)).with_representatives(vec!["Bob".to_string()]);
        let report = build_dashboard(&sample(), &filter, &DashboardConfig::default()).unwrap();

        assert_eq!(report.kpis.total_sales, 60.0);
        assert_eq!(report.kpis.previous_day_total, 200.0);
        assert!((report.kpis.daily_growth_pct + 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_rankings_and_pareto() {
        let report =
            build_dashboard(&sample(), &DashboardFilter::for_date(day(8)), &DashboardConfig::default())
                .unwrap();

        assert_eq!(report.top_representatives[0].label, "Alice");
        assert_eq!(report.top_representatives[0].total, 200.0);
        assert_eq!(report.top_products[0].label, "Hammer");
        assert_eq!(report.by_category[0].label, "Tools");
        assert_eq!(report.by_category[0].total, 240.0);

        // 3 reps * 0.2 -> 1 contributor
        assert_eq!(report.pareto.contribution.contributors, vec!["Alice"]);
        let pct = report.pareto.contribution.contribution_percentage.unwrap();
        assert!((pct - 200.0 / 300.0 * 100.0).abs() < 1e-9);
        assert_eq!(
            report.pareto.narrative(),
            "The top 20% of representatives (Alice) contributed 66.67% of sales."
        );
    }

    #[test]
    fn test_top_n_respects_config() {
        let config = DashboardConfig {
            top_n: 2,
            pareto_fraction: 0.2,
        };
        let report = build_dashboard(&sample(), &DashboardFilter::for_date(day(8)), &config).unwrap();
        assert_eq!(report.top_products.len(), 2);
        assert_eq!(report.by_region.len(), 1);
    }

    #[test]
    fn test_empty_selection_has_no_report() {
        let filter = DashboardFilter::for_date(day(8)).with_categories(vec!["Garden".to_string()]);
        assert!(build_dashboard(&sample(), &filter, &DashboardConfig::default()).is_none());
        assert!(build_dashboard(
            &sample(),
            &DashboardFilter::for_date(day(20)),
            &DashboardConfig::default()
        )
        .is_none());
    }

    #[test]
    fn test_first_day_has_zero_growth() {
        let report =
            build_dashboard(&sample(), &DashboardFilter::for_date(day(1)), &DashboardConfig::default())
                .unwrap();
        assert_eq!(report.kpis.previous_day_total, 0.0);
        assert_eq!(report.kpis.daily_growth_pct, 0.0);
        assert_eq!(report.kpis.weekly_growth_pct, 0.0);
    }

    #[test]
    fn test_short_history_warns_but_forecasts() {
        let outcome = forecast_sales(
            &sample(),
            day(8),
            &TrendForecaster::default(),
            &ForecastConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome.history_days, 3);
        assert!(outcome.warning.is_some());
        assert_eq!(outcome.points.len(), 30);
        assert_eq!(outcome.points[0].date, day(9));
    }

    #[test]
    fn test_history_cut_at_as_of() {
        let records: Vec<SalesRecord> = (1..=20)
            .map(|d| create_test_record(d, "Alice", "Tools", "Hammer", 10.0 * d as f64))
            .collect();
        let all = RecordSet::new(records);

        let outcome = forecast_sales(
            &all,
            day(15),
            &TrendForecaster::default(),
            &ForecastConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome.history_days, 15);
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.points[0].date, day(16));
        assert!((outcome.points[0].estimate - 160.0).abs() < 1e-6);
    }

    #[test]
    fn test_select_groups_spans_all_days() {
        let all = sample();
        let reps = vec!["Alice".to_string()];

        let alice = select_groups(&all, Some(&reps), None);
        assert_eq!(alice.len(), 4);
        assert!(alice.iter().all(|r| r.representative == "Alice"));
        assert!(alice.date_range().unwrap().0 < day(8));

        assert_eq!(select_groups(&all, None, None), all);
    }

    #[test]
    fn test_sales_history() {
        let history = sales_history(&sample());
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].total, 300.0);
    }

    #[test]
    fn test_pareto_summary_json_is_flat() {
        let summary = ParetoSummary {
            fraction: 0.2,
            contribution: ParetoContribution {
                contributors: vec!["Alice".to_string()],
                contribution_percentage: None,
            },
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["contributors"][0], "Alice");
        assert!(json["contribution_percentage"].is_null());
        assert_eq!(
            summary.narrative(),
            "No sales under the current filter, contribution analysis unavailable."
        );
    }
}
