//! Additive Seasonal Decomposition Model
//!
//! y(t) = trend(t) + Σ seasonality_k(t) + ε
//!
//! - Trend is piecewise linear with changepoints spread over the first part
//!   of the history.
//! - Each seasonality is a truncated Fourier series with a fixed period
//!   (yearly, weekly, daily).
//! - All coefficients are estimated jointly by ridge-regularised least squares
//!   on the max-abs-scaled target; the ridge weights play the role of priors
//!   on the changepoint deltas and Fourier amplitudes.
//! - Prediction intervals assume Gaussian residuals with the in-sample
//!   residual standard deviation.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

use super::ModelMetadata;
use crate::config::{SeasonalConfig, Toggle};
use crate::domain::ModelKind;

const SECONDS_PER_DAY: f64 = 86_400.0;
const STABILITY_RIDGE: f64 = 1e-9;

/// One periodic component of the decomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponent {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
}

impl SeasonalComponent {
    fn new(name: &str, period_days: f64, fourier_order: usize) -> Self {
        Self {
            name: name.to_string(),
            period_days,
            fourier_order,
        }
    }

    fn width(&self) -> usize {
        2 * self.fourier_order
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPrediction {
    pub timestamp: DateTime<Utc>,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalDecomposition {
    pub metadata: ModelMetadata,
    pub config: SeasonalConfig,
    /// Timestamps seen during fitting, in order
    history: Vec<DateTime<Utc>>,
    t_scale_secs: f64,
    y_scale: f64,
    /// Changepoint locations on the scaled time axis
    changepoints: Vec<f64>,
    components: Vec<SeasonalComponent>,
    /// [offset, slope, changepoint deltas.., fourier coefficients..]
    coefficients: Vec<f64>,
    /// Residual standard deviation in target units
    sigma: f64,
}

impl SeasonalDecomposition {
    pub fn fit(points: &[(DateTime<Utc>, f64)], config: SeasonalConfig) -> Result<Self> {
        if points.len() < 2 {
            anyhow::bail!(
                "Seasonal decomposition needs at least 2 observations, got {}",
                points.len()
            );
        }
        if !(0.0..1.0).contains(&config.interval_width) {
            anyhow::bail!("Interval width must be in [0, 1), got {}", config.interval_width);
        }

        let history: Vec<DateTime<Utc>> = points.iter().map(|(ts, _)| *ts).collect();
        let first = history[0];
        let last = history[history.len() - 1];
        let span_secs = seconds_between(first, last);
        let t_scale_secs = if span_secs > 0.0 { span_secs } else { 1.0 };

        let y_max = points.iter().map(|(_, y)| y.abs()).fold(0.0f64, f64::max);
        let y_scale = if y_max > 0.0 { y_max } else { 1.0 };

        let components = Self::select_components(&config, span_secs / SECONDS_PER_DAY);
        let t_hist: Vec<f64> = history
            .iter()
            .map(|ts| seconds_between(first, *ts) / t_scale_secs)
            .collect();
        let changepoints = place_changepoints(&t_hist, config.n_changepoints, config.changepoint_range);

        let mut model = Self {
            metadata: ModelMetadata::new(ModelKind::SeasonalDecomposition, points.len()),
            config,
            history,
            t_scale_secs,
            y_scale,
            changepoints,
            components,
            coefficients: Vec::new(),
            sigma: 0.0,
        };

        let n = points.len();
        let p = model.n_coefficients();
        let x = DMatrix::from_row_iterator(
            n,
            p,
            points.iter().flat_map(|(ts, _)| model.design_row(*ts)),
        );
        let y = DVector::from_iterator(n, points.iter().map(|(_, v)| v / y_scale));

        let mut xtx = x.tr_mul(&x);
        for (i, penalty) in model.penalties().into_iter().enumerate() {
            xtx[(i, i)] += penalty + STABILITY_RIDGE;
        }
        let xty = x.tr_mul(&y);

        let beta = match xtx.clone().cholesky() {
            Some(chol) => chol.solve(&xty),
            None => xtx
                .lu()
                .solve(&xty)
                .ok_or_else(|| anyhow::anyhow!("Seasonal least-squares system is singular"))?,
        };
        model.coefficients = beta.iter().copied().collect();

        let fitted = &x * &beta;
        let sse: f64 = fitted
            .iter()
            .zip(points.iter())
            .map(|(f, (_, actual))| (actual - f * y_scale).powi(2))
            .sum();
        model.sigma = (sse / (n - 1) as f64).sqrt();

        tracing::debug!(
            samples = n,
            coefficients = p,
            changepoints = model.changepoints.len(),
            components = ?model.components.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            sigma = model.sigma,
            "seasonal decomposition fitted"
        );

        Ok(model)
    }

    fn select_components(config: &SeasonalConfig, span_days: f64) -> Vec<SeasonalComponent> {
        let mut components = Vec::new();
        if config.yearly {
            components.push(SeasonalComponent::new("yearly", 365.25, 10));
        }
        let weekly = match config.weekly {
            Toggle::On => true,
            Toggle::Off => false,
            Toggle::Auto => span_days >= 14.0,
        };
        if weekly {
            components.push(SeasonalComponent::new("weekly", 7.0, 3));
        }
        if config.daily {
            components.push(SeasonalComponent::new("daily", 1.0, 4));
        }
        components
    }

    fn n_coefficients(&self) -> usize {
        2 + self.changepoints.len() + self.components.iter().map(|c| c.width()).sum::<usize>()
    }

    fn penalties(&self) -> Vec<f64> {
        let cp = 1.0 / self.config.changepoint_prior_scale.powi(2);
        let seasonal = 1.0 / self.config.seasonality_prior_scale.powi(2);
        let mut out = vec![0.0, 0.0];
        out.extend(std::iter::repeat(cp).take(self.changepoints.len()));
        out.extend(
            std::iter::repeat(seasonal).take(self.n_coefficients() - 2 - self.changepoints.len()),
        );
        out
    }

    fn scaled_time(&self, ts: DateTime<Utc>) -> f64 {
        seconds_between(self.history[0], ts) / self.t_scale_secs
    }

    fn design_row(&self, ts: DateTime<Utc>) -> Vec<f64> {
        let t = self.scaled_time(ts);
        let mut row = Vec::with_capacity(self.n_coefficients());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|c| (t - c).max(0.0)));

        let t_days = ts.timestamp() as f64 / SECONDS_PER_DAY
            + ts.timestamp_subsec_nanos() as f64 / 1e9 / SECONDS_PER_DAY;
        for component in &self.components {
            for k in 1..=component.fourier_order {
                let angle = 2.0 * PI * k as f64 * t_days / component.period_days;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        row
    }

    pub fn components(&self) -> &[SeasonalComponent] {
        &self.components
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_end(&self) -> DateTime<Utc> {
        self.history[self.history.len() - 1]
    }

    pub fn residual_sigma(&self) -> f64 {
        self.sigma
    }

    /// History timestamps followed by `periods` hourly steps after the last one
    pub fn future_frame(&self, periods: usize) -> Vec<DateTime<Utc>> {
        let end = self.history_end();
        self.history
            .iter()
            .copied()
            .chain((1..=periods).map(|step| end + Duration::hours(step as i64)))
            .collect()
    }

    pub fn predict(&self, timestamps: &[DateTime<Utc>]) -> Result<Vec<SeasonalPrediction>> {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| anyhow::anyhow!("Failed to build normal distribution: {}", e))?;
        let z = normal.inverse_cdf(0.5 + self.config.interval_width / 2.0);
        let half_width = z * self.sigma;

        Ok(timestamps
            .iter()
            .map(|ts| {
                let yhat = self
                    .design_row(*ts)
                    .iter()
                    .zip(&self.coefficients)
                    .map(|(x, b)| x * b)
                    .sum::<f64>()
                    * self.y_scale;
                SeasonalPrediction {
                    timestamp: *ts,
                    yhat,
                    yhat_lower: yhat - half_width,
                    yhat_upper: yhat + half_width,
                }
            })
            .collect())
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Changepoints at evenly spaced row positions within the first `range` share of history
fn place_changepoints(t_hist: &[f64], requested: usize, range: f64) -> Vec<f64> {
    let hist_size = (t_hist.len() as f64 * range).floor() as usize;
    let n_changepoints = requested.min(hist_size.saturating_sub(1));
    if n_changepoints == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=n_changepoints)
        .map(|i| {
            let idx = (i as f64 * last / n_changepoints as f64).round() as usize;
            t_hist[idx]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 11, 0, 0, 0).unwrap()
    }

    /// Daily sine on top of a gentle upward trend
    fn series(hours: usize) -> Vec<(DateTime<Utc>, f64)> {
        (0..hours)
            .map(|h| {
                let ts = start() + Duration::hours(h as i64);
                let daily = 20.0 * (2.0 * PI * h as f64 / 24.0).sin();
                (ts, 100.0 + 0.01 * h as f64 + daily)
            })
            .collect()
    }

    fn config() -> SeasonalConfig {
        SeasonalConfig {
            yearly: false,
            ..SeasonalConfig::default()
        }
    }

    #[test]
    fn test_fit_recovers_daily_pattern() {
        let data = series(24 * 28);
        let model = SeasonalDecomposition::fit(&data, config()).unwrap();

        let frame = model.future_frame(24);
        let tail = &frame[frame.len() - 24..];
        let predictions = model.predict(tail).unwrap();

        for p in &predictions {
            let h = (p.timestamp - start()).num_hours() as f64;
            let expected = 100.0 + 0.01 * h + 20.0 * (2.0 * PI * h / 24.0).sin();
            assert!((p.yhat - expected).abs() < 2.0, "h={h} yhat={} expected={expected}", p.yhat);
            assert!(p.yhat_lower <= p.yhat && p.yhat <= p.yhat_upper);
        }
    }

    #[test]
    fn test_component_selection() {
        let short = SeasonalDecomposition::fit(&series(24 * 5), config()).unwrap();
        let names: Vec<_> = short.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["daily"]);

        let long = SeasonalDecomposition::fit(&series(24 * 20), SeasonalConfig::default()).unwrap();
        let names: Vec<_> = long.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["yearly", "weekly", "daily"]);
    }

    #[test]
    fn test_future_frame_extends_history_hourly() {
        let data = series(48);
        let model = SeasonalDecomposition::fit(&data, config()).unwrap();
        let frame = model.future_frame(3);

        assert_eq!(frame.len(), 51);
        assert_eq!(frame[47], model.history_end());
        assert_eq!(frame[50] - frame[47], Duration::hours(3));
    }

    #[test]
    fn test_changepoint_placement() {
        let t: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
        let cps = place_changepoints(&t, 25, 0.8);
        assert_eq!(cps.len(), 25);
        assert!(cps.iter().all(|c| *c > 0.0 && *c <= t[79]));
        assert!(cps.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(place_changepoints(&t[..2], 25, 0.8).len(), 0);
    }

    #[test]
    fn test_rejects_too_few_points() {
        assert!(SeasonalDecomposition::fit(&series(1), config()).is_err());
    }

    #[test]
    fn test_interval_width_follows_residual_sigma() {
        let model = SeasonalDecomposition::fit(&series(24 * 15), config()).unwrap();
        let sigma = model.residual_sigma();
        assert!(sigma.is_finite() && sigma >= 0.0);

        let z = Normal::new(0.0, 1.0)
            .unwrap()
            .inverse_cdf(0.5 + config().interval_width / 2.0);
        let predictions = model.predict(&model.future_frame(6)).unwrap();
        for p in &predictions {
            let width = p.yhat_upper - p.yhat_lower;
            assert!((width - 2.0 * z * sigma).abs() < 1e-9);
            assert!((p.yhat - (p.yhat_lower + p.yhat_upper) / 2.0).abs() < 1e-9);
        }
    }
}
