//! Dashboard manifest loaded from `campus.yaml`.

use crate::error::ParseError;
use campus_core::dashboard::{default_kpis, ComposerConfig, DEFAULT_ENTITY_COUNT};
use campus_core::series::{
    clamp_accuracy, clamp_threshold, ACCURACY_RANGE, DEFAULT_ACCURACY, DEFAULT_THRESHOLD,
    MATRIX_COLS, MATRIX_ROWS, MAX_MATRIX_DIM, THRESHOLD_RANGE,
};
use campus_core::{MetricSpec, DEFAULT_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Dashboard configuration manifest.
///
/// Every field has a default, so an empty document is a valid manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardManifest {
    /// Dashboard name
    pub name: String,
    /// Live KPI tick period
    pub tick_interval_ms: u64,
    /// Entities seeded into the table
    pub entity_count: usize,
    /// Noise seed; entropy when absent
    pub seed: Option<u64>,
    /// Directory for persisted preferences
    pub state_dir: Option<PathBuf>,
    /// Analytics controls
    pub analytics: AnalyticsConfig,
    /// Correlation matrix shape
    pub matrix: MatrixConfig,
    /// KPI overrides, merged by name into the default set
    pub metrics: Vec<MetricSpec>,
}

impl Default for DashboardManifest {
    fn default() -> Self {
        Self {
            name: "campus".to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            entity_count: DEFAULT_ENTITY_COUNT,
            seed: None,
            state_dir: None,
            analytics: AnalyticsConfig::default(),
            matrix: MatrixConfig::default(),
            metrics: Vec::new(),
        }
    }
}

/// Predictive analytics controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Prediction accuracy (50-100)
    pub accuracy: f64,
    /// Anomaly threshold (0-60)
    pub threshold: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Correlation matrix dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub rows: usize,
    pub cols: usize,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            rows: MATRIX_ROWS,
            cols: MATRIX_COLS,
        }
    }
}

impl DashboardManifest {
    /// Parse a manifest from YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self, ParseError> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Read and validate a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML or
    /// fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let text = fs::read_to_string(path)?;
        let manifest = Self::from_yaml(&text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Serialize manifest to YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ParseError> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check structural constraints.
    ///
    /// Analytics controls outside their range are not errors; they are
    /// clamped when the config is built.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ParseError> {
        check_interval("tick_interval_ms", self.tick_interval_ms)?;
        for (field, value) in [("matrix.rows", self.matrix.rows), ("matrix.cols", self.matrix.cols)] {
            if value > MAX_MATRIX_DIM {
                return Err(ParseError::invalid(
                    field,
                    format!("{value} exceeds the limit of {MAX_MATRIX_DIM}"),
                ));
            }
        }

        let mut seen = HashSet::new();
        for (i, metric) in self.metrics.iter().enumerate() {
            let field = |name: &str| format!("metrics[{i}].{name}");
            if metric.name.trim().is_empty() {
                return Err(ParseError::invalid(field("name"), "must not be empty"));
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(ParseError::Validation(format!(
                    "duplicate metric '{}'",
                    metric.name
                )));
            }
            if metric.min > metric.max {
                return Err(ParseError::invalid(
                    field("min"),
                    format!("{} exceeds max {}", metric.min, metric.max),
                ));
            }
            if metric.min_delta > metric.max_delta {
                return Err(ParseError::invalid(
                    field("min_delta"),
                    format!("{} exceeds max_delta {}", metric.min_delta, metric.max_delta),
                ));
            }
            if metric.min_delta < 0.0 {
                return Err(ParseError::invalid(field("min_delta"), "must not be negative"));
            }
            if let Some(interval) = metric.tick_interval_ms {
                check_interval(&field("tick_interval_ms"), interval)?;
            }
        }
        Ok(())
    }

    /// KPI set after applying overrides: same-name entries replace the
    /// default, new names are appended.
    #[must_use]
    pub fn kpis(&self) -> Vec<MetricSpec> {
        let mut kpis = default_kpis();
        for metric in &self.metrics {
            match kpis.iter_mut().find(|k| k.name == metric.name) {
                Some(existing) => *existing = metric.clone(),
                None => kpis.push(metric.clone()),
            }
        }
        kpis
    }

    /// Composer settings for this manifest.
    #[must_use]
    pub fn composer_config(&self) -> ComposerConfig {
        if !ACCURACY_RANGE.contains(&self.analytics.accuracy) {
            warn!(accuracy = self.analytics.accuracy, "analytics accuracy out of range, clamping");
        }
        if !THRESHOLD_RANGE.contains(&self.analytics.threshold) {
            warn!(threshold = self.analytics.threshold, "anomaly threshold out of range, clamping");
        }
        ComposerConfig {
            tick_interval_ms: self.tick_interval_ms,
            entity_count: self.entity_count,
            metrics: self.kpis(),
            accuracy: clamp_accuracy(self.analytics.accuracy),
            threshold: clamp_threshold(self.analytics.threshold),
            matrix_rows: self.matrix.rows,
            matrix_cols: self.matrix.cols,
            now_hour: None,
        }
    }
}

fn check_interval(field: &str, interval_ms: u64) -> Result<(), ParseError> {
    if interval_ms == 0 {
        return Err(ParseError::invalid(field, "must be positive"));
    }
    if interval_ms > MAX_TICK_INTERVAL_MS {
        return Err(ParseError::invalid(
            field,
            format!("{interval_ms} exceeds the limit of {MAX_TICK_INTERVAL_MS} ms"),
        ));
    }
    Ok(())
}
