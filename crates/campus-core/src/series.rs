//! Synthetic dataset generation for dashboard charts.
//!
//! Every dataset is a closed-form function of the point index plus additive
//! noise drawn from a [`NoiseSource`]. Calls are never cached: each view
//! activation asks for fresh data and gets a fully materialized `Vec`.
//!
//! | kind | default length | shape |
//! |------|----------------|-------|
//! | hourly | 24 | solar half-sine, pump load, water level |
//! | prediction | 20 | actual/predicted sinusoids with a fixed band |
//! | forecast | 24 | daily activity curve |
//! | solar-angle | 24 | solar elevation in degrees |
//! | features | 6 | static feature importances |
//! | matrix | 8 x 12 | correlation heatmap cells |
//! | training | 30 | geometric loss decay |
//! | analytics | 24 | predictions scaled by accuracy, anomaly load |
//! | security | 12 | monthly alert trend |
//! | anomalies | 12 | monthly detected anomalies |

use crate::error::CoreError;
use crate::noise::NoiseSource;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use tracing::warn;

/// Allowed range for the prediction accuracy control.
pub const ACCURACY_RANGE: RangeInclusive<f64> = 50.0..=100.0;

/// Allowed range for the anomaly threshold control.
pub const THRESHOLD_RANGE: RangeInclusive<f64> = 0.0..=60.0;

/// Default prediction accuracy control value.
pub const DEFAULT_ACCURACY: f64 = 78.0;

/// Default anomaly threshold control value.
pub const DEFAULT_THRESHOLD: f64 = 24.0;

/// Default correlation matrix rows.
pub const MATRIX_ROWS: usize = 8;

/// Default correlation matrix columns.
pub const MATRIX_COLS: usize = 12;

/// Largest matrix side; larger requests are clamped.
pub const MAX_MATRIX_DIM: usize = 256;

/// Largest point count per series; larger requests are clamped.
pub const MAX_SERIES_LENGTH: usize = 100_000;

/// Static model feature importances, in display order.
pub const FEATURE_IMPORTANCE: [(&str, f64); 6] = [
    ("Location Data", 0.32),
    ("Time Patterns", 0.22),
    ("Access Logs", 0.17),
    ("Device Usage", 0.12),
    ("Social Patterns", 0.09),
    ("Historical Data", 0.08),
];

/// Dataset families the synthesizer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesKind {
    /// Hourly solar/pump/level readings
    Hourly,
    /// Actual vs predicted with a confidence band
    Prediction,
    /// Daily activity forecast
    Forecast,
    /// Solar elevation angle
    SolarAngle,
    /// Feature importance bars
    Features,
    /// Correlation matrix
    Matrix,
    /// Training loss curve
    Training,
    /// Predictive analytics series
    Analytics,
    /// Monthly security alerts
    Security,
    /// Monthly detected anomalies
    Anomalies,
}

impl SeriesKind {
    /// Every kind, in display order.
    pub const ALL: [Self; 10] = [
        Self::Hourly,
        Self::Prediction,
        Self::Forecast,
        Self::SolarAngle,
        Self::Features,
        Self::Matrix,
        Self::Training,
        Self::Analytics,
        Self::Security,
        Self::Anomalies,
    ];

    /// Stable kebab-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Prediction => "prediction",
            Self::Forecast => "forecast",
            Self::SolarAngle => "solar-angle",
            Self::Features => "features",
            Self::Matrix => "matrix",
            Self::Training => "training",
            Self::Analytics => "analytics",
            Self::Security => "security",
            Self::Anomalies => "anomalies",
        }
    }

    /// Number of points produced when no length is given.
    #[must_use]
    pub const fn default_length(self) -> usize {
        match self {
            Self::Hourly | Self::Forecast | Self::SolarAngle | Self::Analytics => 24,
            Self::Prediction => 20,
            Self::Features => FEATURE_IMPORTANCE.len(),
            Self::Matrix => MATRIX_ROWS * MATRIX_COLS,
            Self::Training => 30,
            Self::Security | Self::Anomalies => 12,
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SeriesKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| CoreError::UnknownSeries(s.to_string()))
    }
}

/// Parameters for a synthesis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesParams {
    /// Point count (kind default when `None`); ignored by matrix and features
    pub length: Option<usize>,
    /// Matrix rows
    pub rows: usize,
    /// Matrix columns
    pub cols: usize,
    /// Hour of day the hourly series ends at (0-23)
    pub now_hour: u32,
    /// Prediction accuracy control, clamped to [`ACCURACY_RANGE`]
    pub accuracy: f64,
}

impl Default for SeriesParams {
    fn default() -> Self {
        Self {
            length: None,
            rows: MATRIX_ROWS,
            cols: MATRIX_COLS,
            now_hour: current_utc_hour(),
            accuracy: DEFAULT_ACCURACY,
        }
    }
}

impl SeriesParams {
    /// Set the point count.
    #[must_use]
    pub const fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Set matrix dimensions.
    #[must_use]
    pub const fn with_matrix(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Set the closing hour for hourly labels.
    #[must_use]
    pub const fn with_now_hour(mut self, hour: u32) -> Self {
        self.now_hour = hour % 24;
        self
    }

    /// Set the accuracy control (clamped).
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = clamp_accuracy(accuracy);
        self
    }

    fn length_for(&self, kind: SeriesKind) -> usize {
        let len = self.length.unwrap_or_else(|| kind.default_length());
        if len > MAX_SERIES_LENGTH {
            warn!(kind = %kind, requested = len, max = MAX_SERIES_LENGTH, "series length clamped");
        }
        len.min(MAX_SERIES_LENGTH)
    }
}

/// Clamp a user accuracy value into [`ACCURACY_RANGE`].
#[must_use]
pub fn clamp_accuracy(value: f64) -> f64 {
    clamp_control(value, ACCURACY_RANGE, DEFAULT_ACCURACY)
}

/// Clamp a user threshold value into [`THRESHOLD_RANGE`].
#[must_use]
pub fn clamp_threshold(value: f64) -> f64 {
    clamp_control(value, THRESHOLD_RANGE, DEFAULT_THRESHOLD)
}

fn clamp_control(value: f64, range: RangeInclusive<f64>, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(*range.start(), *range.end())
    }
}

/// Hour of day in UTC.
#[must_use]
pub fn current_utc_hour() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| ((d.as_secs() / 3600) % 24) as u32)
}

/// One point of a synthesized dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "series", rename_all = "snake_case")]
pub enum SeriesPoint {
    /// Hourly energy reading
    Hourly {
        time: String,
        solar: f64,
        pump: f64,
        level: f64,
    },
    /// Prediction with confidence band
    Prediction {
        t: String,
        actual: f64,
        predicted: f64,
        low: f64,
        high: f64,
    },
    /// Forecast activity count
    Forecast { hour: String, activities: f64 },
    /// Solar elevation
    SolarAngle { hour: String, angle: f64 },
    /// Feature importance bar
    Feature { name: String, importance: f64 },
    /// Correlation matrix cell
    Cell {
        key: String,
        row: usize,
        col: usize,
        value: f64,
    },
    /// Training epoch loss
    Epoch { e: u32, loss: f64 },
    /// Predictive analytics sample
    Analytics {
        h: String,
        predictions: f64,
        anomalies: f64,
    },
    /// Monthly security alerts
    SecurityTrend { month: String, alerts: f64 },
    /// Monthly detected anomalies
    AnomalyTrend { month: String, detected: f64 },
}

impl SeriesPoint {
    /// Category label (x axis).
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Hourly { time, .. } => time.clone(),
            Self::Prediction { t, .. } => t.clone(),
            Self::Forecast { hour, .. } | Self::SolarAngle { hour, .. } => hour.clone(),
            Self::Feature { name, .. } => name.clone(),
            Self::Cell { key, .. } => key.clone(),
            Self::Epoch { e, .. } => e.to_string(),
            Self::Analytics { h, .. } => h.clone(),
            Self::SecurityTrend { month, .. } | Self::AnomalyTrend { month, .. } => month.clone(),
        }
    }

    /// Numeric fields by name, in declaration order.
    #[must_use]
    pub fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        match self {
            Self::Hourly {
                solar, pump, level, ..
            } => vec![("solar", *solar), ("pump", *pump), ("level", *level)],
            Self::Prediction {
                actual,
                predicted,
                low,
                high,
                ..
            } => vec![
                ("actual", *actual),
                ("predicted", *predicted),
                ("low", *low),
                ("high", *high),
            ],
            Self::Forecast { activities, .. } => vec![("activities", *activities)],
            Self::SolarAngle { angle, .. } => vec![("angle", *angle)],
            Self::Feature { importance, .. } => vec![("importance", *importance)],
            Self::Cell { value, .. } => vec![("value", *value)],
            Self::Epoch { loss, .. } => vec![("loss", *loss)],
            Self::Analytics {
                predictions,
                anomalies,
                ..
            } => vec![("predictions", *predictions), ("anomalies", *anomalies)],
            Self::SecurityTrend { alerts, .. } => vec![("alerts", *alerts)],
            Self::AnomalyTrend { detected, .. } => vec![("detected", *detected)],
        }
    }

    /// Look up one numeric field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<f64> {
        self.numeric_fields()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

/// Generate a dataset of the given kind.
///
/// The result has exactly `length` points (kind default when unset, at most
/// [`MAX_SERIES_LENGTH`]), except `Matrix` which has `rows * cols` cells and
/// `Features` which is the static six-entry list.
pub fn generate(kind: SeriesKind, params: &SeriesParams, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    let len = params.length_for(kind);
    match kind {
        SeriesKind::Hourly => hourly(len, params.now_hour, noise),
        SeriesKind::Prediction => prediction(len, noise),
        SeriesKind::Forecast => forecast(len, noise),
        SeriesKind::SolarAngle => solar_angle(len, noise),
        SeriesKind::Features => feature_importance(),
        SeriesKind::Matrix => matrix(params.rows, params.cols, noise),
        SeriesKind::Training => training(len, noise),
        SeriesKind::Analytics => analytics(len, params.accuracy, noise),
        SeriesKind::Security => security_trend(len, noise),
        SeriesKind::Anomalies => anomaly_trend(len, noise),
    }
}

/// Fraction of a half sine period at `i` of `len`.
fn half_sine(i: usize, len: usize) -> f64 {
    (i as f64 / len as f64 * PI).sin()
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Hourly readings whose labels end at `now_hour`.
pub fn hourly(len: usize, now_hour: u32, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    let half = len as f64 / 2.0;
    (0..len)
        .map(|i| {
            let hours_back = ((len - 1 - i) % 24) as u32;
            let hour = (now_hour % 24 + 24 - hours_back) % 24;
            let solar = half_sine(i, len).mul_add(600.0, noise.range(0.0, 40.0)).max(0.0);
            let peak = if i % 3 == 0 { 40.0 } else { 0.0 };
            let pump = 200.0 + noise.range(0.0, 80.0) + peak;
            let level = (i as f64 / half * PI).sin().mul_add(-6.0, 40.0) + noise.range(0.0, 1.5);
            SeriesPoint::Hourly {
                time: format!("{hour}:00"),
                solar,
                pump,
                level,
            }
        })
        .collect()
}

/// Actual and predicted sinusoids with a deterministic band.
///
/// The band is cosmetic: `actual`/`predicted` may cross `low`/`high`.
pub fn prediction(len: usize, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    let half = len as f64 / 2.0;
    (0..len)
        .map(|i| {
            let s = (i as f64 / half * PI).sin();
            SeriesPoint::Prediction {
                t: format!("T{i}"),
                actual: (s.mul_add(120.0, 400.0) + noise.range(0.0, 50.0)).round(),
                predicted: (s.mul_add(110.0, 410.0) + noise.range(0.0, 40.0)).round(),
                low: s.mul_add(100.0, 380.0).round(),
                high: s.mul_add(120.0, 460.0).round(),
            }
        })
        .collect()
}

/// Daily activity forecast.
pub fn forecast(len: usize, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    (0..len)
        .map(|i| SeriesPoint::Forecast {
            hour: format!("{i}h"),
            activities: (half_sine(i, len).mul_add(120.0, 300.0) + noise.range(0.0, 40.0)).round(),
        })
        .collect()
}

/// Solar elevation with symmetric jitter, floored at zero.
pub fn solar_angle(len: usize, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    (0..len)
        .map(|i| SeriesPoint::SolarAngle {
            hour: format!("{i}h"),
            angle: half_sine(i, len)
                .mul_add(75.0, noise.range(-2.0, 2.0))
                .round()
                .max(0.0),
        })
        .collect()
}

/// The static feature importance list. Consumes no noise.
#[must_use]
pub fn feature_importance() -> Vec<SeriesPoint> {
    FEATURE_IMPORTANCE
        .iter()
        .map(|(name, importance)| SeriesPoint::Feature {
            name: (*name).to_string(),
            importance: *importance,
        })
        .collect()
}

/// Row-major correlation cells keyed `r{row}c{col}`.
///
/// Each side is clamped to [`MAX_MATRIX_DIM`].
pub fn matrix(rows: usize, cols: usize, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    if rows > MAX_MATRIX_DIM || cols > MAX_MATRIX_DIM {
        warn!(rows, cols, max = MAX_MATRIX_DIM, "matrix dimensions clamped");
    }
    let rows = rows.min(MAX_MATRIX_DIM);
    let cols = cols.min(MAX_MATRIX_DIM);
    let mut cells = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let wave = ((r + c) as f64 / 4.0).sin();
            cells.push(SeriesPoint::Cell {
                key: format!("r{r}c{c}"),
                row: r,
                col: c,
                value: (wave.mul_add(30.0, 40.0) + noise.range(0.0, 20.0)).round(),
            });
        }
    }
    cells
}

/// Loss curve `0.9^(i/2)` plus one-sided noise, rounded to 3 places.
pub fn training(epochs: usize, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    (0..epochs)
        .map(|i| SeriesPoint::Epoch {
            e: (i + 1) as u32,
            loss: round3(0.9_f64.powf(i as f64 / 2.0) + noise.range(0.0, 0.05)),
        })
        .collect()
}

/// Predictive analytics series parameterized by the accuracy control.
pub fn analytics(len: usize, accuracy: f64, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    let accuracy = clamp_accuracy(accuracy);
    (0..len)
        .map(|i| {
            let peak = if i % 3 == 0 { 40.0 } else { 0.0 };
            SeriesPoint::Analytics {
                h: format!("{i}:00"),
                predictions: half_sine(i, len).mul_add(600.0 + accuracy, 50.0).max(0.0),
                anomalies: 250.0 + peak + noise.range(0.0, 30.0),
            }
        })
        .collect()
}

/// Monthly alert counts with a linear upward trend.
pub fn security_trend(len: usize, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    (0..len)
        .map(|i| SeriesPoint::SecurityTrend {
            month: format!("M{}", i + 1),
            alerts: (40.0 + 5.0 * i as f64 + noise.range(0.0, 10.0)).round(),
        })
        .collect()
}

/// Monthly detected anomaly counts.
pub fn anomaly_trend(len: usize, noise: &mut dyn NoiseSource) -> Vec<SeriesPoint> {
    (0..len)
        .map(|i| SeriesPoint::AnomalyTrend {
            month: format!("M{}", i + 1),
            detected: (0.3_f64.mul_add(i as f64, 4.0) + noise.range(0.0, 0.5)).round(),
        })
        .collect()
}

/// Estimated savings: how far the last prediction overshoots the actual.
#[must_use]
pub fn savings(points: &[SeriesPoint]) -> f64 {
    points
        .iter()
        .rev()
        .find_map(|p| match p {
            SeriesPoint::Prediction {
                actual, predicted, ..
            } => Some((predicted - actual).max(0.0)),
            _ => None,
        })
        .unwrap_or(0.0)
}

/// Mean forecast activity, rounded.
#[must_use]
pub fn mean_activities(points: &[SeriesPoint]) -> f64 {
    let values: Vec<f64> = points.iter().filter_map(|p| p.field("activities")).collect();
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().sum::<f64>() / values.len() as f64).round()
}

/// Power source mode derived from live solar output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Solar output above 300 kW
    Solar,
    /// Solar output above 150 kW
    Hybrid,
    /// Grid supplied
    Grid,
}

impl OperatingMode {
    /// Classify a solar output in kW.
    #[must_use]
    pub fn from_solar_kw(kw: f64) -> Self {
        if kw > 300.0 {
            Self::Solar
        } else if kw > 150.0 {
            Self::Hybrid
        } else {
            Self::Grid
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solar => write!(f, "Solar"),
            Self::Hybrid => write!(f, "Hybrid"),
            Self::Grid => write!(f, "Grid"),
        }
    }
}

/// Generates datasets with an owned noise source.
pub struct SeriesSynthesizer {
    noise: Box<dyn NoiseSource>,
}

impl SeriesSynthesizer {
    /// Create a synthesizer drawing from `noise`.
    pub fn new(noise: impl NoiseSource + 'static) -> Self {
        Self {
            noise: Box::new(noise),
        }
    }

    /// Generate a fresh dataset.
    pub fn generate(&mut self, kind: SeriesKind, params: &SeriesParams) -> Vec<SeriesPoint> {
        generate(kind, params, self.noise.as_mut())
    }
}

impl fmt::Debug for SeriesSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesSynthesizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{SeededNoise, SequenceNoise};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn params() -> SeriesParams {
        SeriesParams::default().with_now_hour(12)
    }

    #[test]
    fn test_default_lengths() {
        let mut noise = SeededNoise::new(1);
        for kind in SeriesKind::ALL {
            let points = generate(kind, &params(), &mut noise);
            assert_eq!(points.len(), kind.default_length(), "{kind}");
        }
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in SeriesKind::ALL {
            assert_eq!(kind.name().parse::<SeriesKind>().ok(), Some(kind));
        }
        assert_eq!("SOLAR_ANGLE".parse::<SeriesKind>().ok(), Some(SeriesKind::SolarAngle));
        assert!("pie".parse::<SeriesKind>().is_err());
    }

    #[test]
    fn test_hourly_labels_end_at_now() {
        let mut noise = SequenceNoise::constant(0.0);
        let points = hourly(24, 5, &mut noise);
        assert_eq!(points[23].label(), "5:00");
        assert_eq!(points[22].label(), "4:00");
        assert_eq!(points[0].label(), "6:00");
    }

    #[test]
    fn test_hourly_shape_with_zero_noise() {
        let mut noise = SequenceNoise::constant(0.0);
        let points = hourly(24, 0, &mut noise);
        assert_eq!(points[0].field("solar"), Some(0.0));
        assert!((points[12].field("solar").unwrap_or_default() - 600.0).abs() < 1e-9);
        assert_eq!(points[0].field("pump"), Some(240.0));
        assert_eq!(points[1].field("pump"), Some(200.0));
        assert!((points[6].field("level").unwrap_or_default() - 34.0).abs() < 1e-9);
        assert!(points.iter().all(|p| p.field("solar").unwrap_or(-1.0) >= 0.0));
    }

    #[test]
    fn test_prediction_band_is_deterministic() {
        let mut a = SequenceNoise::constant(0.0);
        let mut b = SequenceNoise::constant(0.9);
        let pa = prediction(20, &mut a);
        let pb = prediction(20, &mut b);
        for (x, y) in pa.iter().zip(&pb) {
            assert_eq!(x.field("low"), y.field("low"));
            assert_eq!(x.field("high"), y.field("high"));
        }
        assert_eq!(pa[0].field("low"), Some(380.0));
        assert_eq!(pa[0].field("high"), Some(460.0));
        assert_eq!(pa[0].field("actual"), Some(400.0));
        assert_eq!(pa[0].field("predicted"), Some(410.0));
        assert_eq!(pa[5].label(), "T5");
    }

    #[test]
    fn test_features_static_and_bounded() {
        let mut noise = SequenceNoise::constant(0.3);
        let points = generate(SeriesKind::Features, &params().with_length(99), &mut noise);
        assert_eq!(points.len(), 6);
        assert_eq!(noise.draws(), 0);
        let total: f64 = points.iter().filter_map(|p| p.field("importance")).sum();
        assert!(total <= 1.0 + 1e-9);
        assert_eq!(points[0].label(), "Location Data");
        assert_eq!(points, feature_importance());
    }

    #[test]
    fn test_matrix_keys_unique() {
        let mut noise = SeededNoise::new(8);
        let cells = generate(SeriesKind::Matrix, &params().with_matrix(8, 12), &mut noise);
        assert_eq!(cells.len(), 96);
        let keys: HashSet<String> = cells.iter().map(SeriesPoint::label).collect();
        assert_eq!(keys.len(), 96);
        for r in 0..8 {
            for c in 0..12 {
                assert!(keys.contains(&format!("r{r}c{c}")));
            }
        }
    }

    #[test]
    fn test_matrix_cell_formula() {
        let mut noise = SequenceNoise::constant(0.0);
        let cells = matrix(2, 2, &mut noise);
        match &cells[3] {
            SeriesPoint::Cell { row, col, value, .. } => {
                assert_eq!((*row, *col), (1, 1));
                assert_eq!(*value, (40.0 + (0.5_f64).sin() * 30.0).round());
            }
            other => panic!("unexpected point {other:?}"),
        }
    }

    #[test]
    fn test_training_loss_decays_with_non_negative_noise() {
        let mut zero = SequenceNoise::constant(0.0);
        let clean = training(30, &mut zero);
        let mut noisy_src = SeededNoise::new(4);
        let noisy = training(30, &mut noisy_src);
        assert_eq!(clean[0].field("loss"), Some(1.0));
        for (c, n) in clean.iter().zip(&noisy) {
            let c = c.field("loss").unwrap_or_default();
            let n = n.field("loss").unwrap_or_default();
            assert!(n >= c - 1e-3);
            assert!(n <= c + 0.05 + 1e-3);
        }
        for pair in clean.windows(2) {
            assert!(pair[1].field("loss") <= pair[0].field("loss"));
        }
        assert_eq!(clean[29].label(), "30");
    }

    #[test]
    fn test_analytics_uses_accuracy() {
        let mut noise = SequenceNoise::constant(0.0);
        let low = analytics(24, 50.0, &mut noise);
        let high = analytics(24, 100.0, &mut noise);
        let peak_low = low[12].field("predictions").unwrap_or_default();
        let peak_high = high[12].field("predictions").unwrap_or_default();
        assert!((peak_low - 700.0).abs() < 1e-9);
        assert!((peak_high - 750.0).abs() < 1e-9);
        assert_eq!(low[0].field("anomalies"), Some(290.0));
    }

    #[test]
    fn test_accuracy_clamped() {
        assert_eq!(clamp_accuracy(10.0), 50.0);
        assert_eq!(clamp_accuracy(150.0), 100.0);
        assert_eq!(clamp_accuracy(f64::NAN), DEFAULT_ACCURACY);
        assert_eq!(clamp_threshold(-5.0), 0.0);
        assert_eq!(clamp_threshold(99.0), 60.0);
        assert_eq!(SeriesParams::default().with_accuracy(3.0).accuracy, 50.0);
    }

    #[test]
    fn test_security_trends() {
        let mut noise = SequenceNoise::constant(0.0);
        let alerts = security_trend(12, &mut noise);
        assert_eq!(alerts[0].field("alerts"), Some(40.0));
        assert_eq!(alerts[11].field("alerts"), Some(95.0));
        assert_eq!(alerts[11].label(), "M12");
        let detected = anomaly_trend(12, &mut noise);
        assert_eq!(detected[0].field("detected"), Some(4.0));
        assert_eq!(detected[10].field("detected"), Some(7.0));
    }

    #[test]
    fn test_solar_angle_floored() {
        let mut noise = SequenceNoise::constant(0.0);
        let points = solar_angle(24, &mut noise);
        assert!(points.iter().all(|p| p.field("angle").unwrap_or(-1.0) >= 0.0));
        assert_eq!(points[12].field("angle"), Some(73.0));
    }

    #[test]
    fn test_savings_and_mean() {
        let points = vec![
            SeriesPoint::Prediction {
                t: "T0".into(),
                actual: 400.0,
                predicted: 390.0,
                low: 0.0,
                high: 0.0,
            },
            SeriesPoint::Prediction {
                t: "T1".into(),
                actual: 400.0,
                predicted: 430.0,
                low: 0.0,
                high: 0.0,
            },
        ];
        assert_eq!(savings(&points), 30.0);
        assert_eq!(savings(&points[..1]), 0.0);
        assert_eq!(savings(&[]), 0.0);

        let forecast = vec![
            SeriesPoint::Forecast {
                hour: "0h".into(),
                activities: 300.0,
            },
            SeriesPoint::Forecast {
                hour: "1h".into(),
                activities: 311.0,
            },
        ];
        assert_eq!(mean_activities(&forecast), 306.0);
        assert_eq!(mean_activities(&[]), 0.0);
    }

    #[test]
    fn test_operating_mode() {
        assert_eq!(OperatingMode::from_solar_kw(420.0), OperatingMode::Solar);
        assert_eq!(OperatingMode::from_solar_kw(300.0), OperatingMode::Hybrid);
        assert_eq!(OperatingMode::from_solar_kw(151.0), OperatingMode::Hybrid);
        assert_eq!(OperatingMode::from_solar_kw(150.0), OperatingMode::Grid);
        assert_eq!(OperatingMode::Grid.to_string(), "Grid");
    }

    #[test]
    fn test_zero_length_is_empty() {
        let mut noise = SeededNoise::new(2);
        for kind in [SeriesKind::Hourly, SeriesKind::Prediction, SeriesKind::Training] {
            assert!(generate(kind, &params().with_length(0), &mut noise).is_empty());
        }
        assert!(matrix(0, 12, &mut noise).is_empty());
    }

    #[test]
    fn test_oversized_matrix_is_clamped() {
        let mut noise = SequenceNoise::constant(0.5);
        let cells = matrix(1 << 33, 1 << 31, &mut noise);
        assert_eq!(cells.len(), MAX_MATRIX_DIM * MAX_MATRIX_DIM);

        let cells = matrix(usize::MAX, 3, &mut noise);
        assert_eq!(cells.len(), MAX_MATRIX_DIM * 3);
        let last = cells.last().map(SeriesPoint::label);
        assert_eq!(last.as_deref(), Some("r255c2"));
    }

    #[test]
    fn test_oversized_length_is_clamped() {
        let mut noise = SequenceNoise::constant(0.5);
        let points = generate(SeriesKind::Training, &params().with_length(usize::MAX), &mut noise);
        assert_eq!(points.len(), MAX_SERIES_LENGTH);
    }

    #[test]
    fn test_synthesizer_regenerates() {
        let mut synth = SeriesSynthesizer::new(SeededNoise::new(11));
        let a = synth.generate(SeriesKind::Forecast, &params());
        let b = synth.generate(SeriesKind::Forecast, &params());
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn test_point_json_tagged() {
        let p = SeriesPoint::Epoch { e: 1, loss: 0.5 };
        let json = serde_json::to_string(&p).unwrap_or_default();
        assert!(json.contains("\"series\":\"epoch\""));
    }

    proptest! {
        #[test]
        fn prop_generate_returns_requested_length(len in 0usize..200, seed in any::<u64>(), idx in 0usize..10) {
            let kind = SeriesKind::ALL[idx];
            let mut noise = SeededNoise::new(seed);
            let points = generate(kind, &params().with_length(len), &mut noise);
            let expected = match kind {
                SeriesKind::Matrix => MATRIX_ROWS * MATRIX_COLS,
                SeriesKind::Features => FEATURE_IMPORTANCE.len(),
                _ => len,
            };
            prop_assert_eq!(points.len(), expected);
            prop_assert!(points.iter().all(|p| p.numeric_fields().iter().all(|(_, v)| v.is_finite())));
        }

        #[test]
        fn prop_matrix_size(rows in 0usize..20, cols in 0usize..20, seed in any::<u64>()) {
            let mut noise = SeededNoise::new(seed);
            prop_assert_eq!(matrix(rows, cols, &mut noise).len(), rows * cols);
        }
    }
}
