// 🔮 Forecast - daily sales projection with confidence bounds
//
// `Forecaster` is the seam to any forecasting backend. `TrendForecaster` is
// the built-in model: a least-squares linear trend over calendar days plus a
// day-of-week offset, with a normal-theory band around each point.

use anyhow::{bail, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::record_set::DailyTotal;

/// Weekday offsets need at least two observations per weekday on average.
const SEASONAL_MIN_POINTS: usize = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Produces `horizon_days` points following the last day of `history`.
///
/// `history` must be ascending by date; gaps between days are allowed.
pub trait Forecaster {
    fn forecast(&self, history: &[DailyTotal], horizon_days: usize) -> Result<Vec<ForecastPoint>>;
}

#[derive(Debug, Clone)]
pub struct TrendForecaster {
    /// Two-sided coverage of the band, in (0, 1)
    pub interval_width: f64,
}

impl TrendForecaster {
    pub fn new(interval_width: f64) -> Self {
        TrendForecaster { interval_width }
    }
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::new(0.95)
    }
}

struct FittedTrend {
    origin: NaiveDate,
    intercept: f64,
    slope: f64,
    weekday_offsets: [f64; 7],
    sigma: f64,
}

impl FittedTrend {
    fn fit(history: &[DailyTotal]) -> Option<Self> {
        let origin = history.first()?.date;
        let n = history.len() as f64;

        let xs: Vec<f64> = history
            .iter()
            .map(|d| (d.date - origin).num_days() as f64)
            .collect();
        let ys: Vec<f64> = history.iter().map(|d| d.total).collect();

        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;

        let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
        let sxy: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (x - x_mean) * (y - y_mean))
            .sum();

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * x_mean;

        let residuals: Vec<f64> = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| y - (intercept + slope * x))
            .collect();

        let mut weekday_offsets = [0.0; 7];
        if history.len() >= SEASONAL_MIN_POINTS {
            let mut sums = [0.0; 7];
            let mut counts = [0usize; 7];
            for (day, r) in history.iter().zip(&residuals) {
                let wd = weekday_index(day.date);
                sums[wd] += r;
                counts[wd] += 1;
            }
            for wd in 0..7 {
                if counts[wd] > 0 {
                    weekday_offsets[wd] = sums[wd] / counts[wd] as f64;
                }
            }
        }

        let sse: f64 = history
            .iter()
            .zip(&residuals)
            .map(|(day, r)| (r - weekday_offsets[weekday_index(day.date)]).powi(2))
            .sum();
        let dof = (n - 2.0).max(1.0);

        Some(FittedTrend {
            origin,
            intercept,
            slope,
            weekday_offsets,
            sigma: (sse / dof).sqrt(),
        })
    }

    fn predict(&self, date: NaiveDate) -> f64 {
        let x = (date - self.origin).num_days() as f64;
        self.intercept + self.slope * x + self.weekday_offsets[weekday_index(date)]
    }
}

fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

impl Forecaster for TrendForecaster {
    fn forecast(&self, history: &[DailyTotal], horizon_days: usize) -> Result<Vec<ForecastPoint>> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            bail!(
                "interval width must be between 0 and 1, got {}",
                self.interval_width
            );
        }

        let (fit, last) = match (FittedTrend::fit(history), history.last()) {
            (Some(fit), Some(last)) => (fit, last.date),
            _ => return Ok(Vec::new()),
        };

        let z = normal_quantile(0.5 + self.interval_width / 2.0);
        let half_width = z * fit.sigma;

        let points = (1..=horizon_days)
            .map(|h| {
                let date = last + Duration::days(h as i64);
                let estimate = fit.predict(date);
                ForecastPoint {
                    date,
                    estimate,
                    lower: estimate - half_width,
                    upper: estimate + half_width,
                }
            })
            .collect();

        Ok(points)
    }
}

/// Inverse CDF of the standard normal distribution (Acklam's rational
/// approximation, relative error below 1.2e-9). `p` must be in (0, 1).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-04 is a Monday
    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn series<F: Fn(usize, NaiveDate) -> f64>(days: usize, f: F) -> Vec<DailyTotal> {
        (0..days)
            .map(|i| {
                let date = start() + Duration::days(i as i64);
                DailyTotal {
                    date,
                    total: f(i, date),
                }
            })
            .collect()
    }

    #[test]
    fn test_normal_quantile() {
        assert!((normal_quantile(0.975) - 1.959964).abs() < 1e-5);
        assert!((normal_quantile(0.5)).abs() < 1e-12);
        assert!((normal_quantile(0.005) + 2.575829).abs() < 1e-5);
        assert!((normal_quantile(0.995) - 2.575829).abs() < 1e-5);
    }

    #[test]
    fn test_empty_history_gives_empty_forecast() {
        let points = TrendForecaster::default().forecast(&[], 30).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_invalid_interval_width() {
        let history = series(5, |_, _| 10.0);
        assert!(TrendForecaster::new(1.0).forecast(&history, 3).is_err());
        assert!(TrendForecaster::new(0.0).forecast(&history, 3).is_err());
    }

    #[test]
    fn test_perfect_linear_trend() {
        let history = series(20, |i, _| 100.0 + 10.0 * i as f64);
        let points = TrendForecaster::default().forecast(&history, 5).unwrap();

        assert_eq!(points.len(), 5);
        assert_eq!(points[0].date, start() + Duration::days(20));
        assert_eq!(points[4].date, start() + Duration::days(24));
        assert!((points[0].estimate - 300.0).abs() < 1e-6);
        assert!((points[4].estimate - 340.0).abs() < 1e-6);
        assert!((points[0].upper - points[0].lower).abs() < 1e-6);
    }

    #[test]
    fn test_single_point_is_flat() {
        let history = series(1, |_, _| 42.0);
        let points = TrendForecaster::default().forecast(&history, 3).unwrap();

        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| (p.estimate - 42.0).abs() < 1e-9));
    }

    #[test]
    fn test_gaps_use_calendar_days() {
        // Day 0 = 0, day 10 = 100: slope 10 per calendar day
        let history = vec![
            DailyTotal { date: start(), total: 0.0 },
            DailyTotal { date: start() + Duration::days(10), total: 100.0 },
        ];
        let points = TrendForecaster::default().forecast(&history, 1).unwrap();

        assert_eq!(points[0].date, start() + Duration::days(11));
        assert!((points[0].estimate - 110.0).abs() < 1e-6);
    }

    #[test]
    fn test_weekend_seasonality_is_captured() {
        let history = series(28, |_, date| {
            if date.weekday().number_from_monday() >= 6 {
                150.0
            } else {
                100.0
            }
        });
        let points = TrendForecaster::default().forecast(&history, 7).unwrap();

        // Forecast starts on a Monday; index 5 is Saturday, 2 is Wednesday
        assert!(points[5].estimate > points[2].estimate + 40.0);
    }

    #[test]
    fn test_bounds_contain_estimate() {
        let history = series(21, |i, _| 100.0 + ((i * 37) % 11) as f64);
        let points = TrendForecaster::default().forecast(&history, 30).unwrap();

        assert_eq!(points.len(), 30);
        for p in &points {
            assert!(p.lower < p.estimate && p.estimate < p.upper);
        }
    }
}
