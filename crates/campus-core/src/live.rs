//! Live KPI values driven by a bounded random walk.
//!
//! A [`BoundedRandomWalk`] holds one scalar. Each [`tick`](BoundedRandomWalk::tick)
//! draws a magnitude uniformly from `[min_delta, max_delta]`, gives it a fair
//! random sign, adds it, clamps into `[min, max]` and rounds to the nearest
//! integer. The walk never rejects or redraws a candidate.
//!
//! # Example
//!
//! ```
//! use campus_core::live::{BoundedRandomWalk, MetricSpec};
//! use campus_core::noise::SequenceNoise;
//!
//! let spec = MetricSpec::new("solar_kw", 420.0, 5.0, 20.0, 100.0, 800.0);
//! let mut walk = BoundedRandomWalk::new(&spec);
//!
//! // magnitude 5 + 0.0 * 15, sign positive
//! let mut noise = SequenceNoise::new(vec![0.0, 0.9]);
//! assert_eq!(walk.tick(&mut noise), 425.0);
//! ```

use crate::noise::NoiseSource;
use serde::{Deserialize, Serialize};

/// Configuration of a single live metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metric name (KPI key)
    pub name: String,
    /// Value at mount
    pub initial: f64,
    /// Smallest step magnitude
    pub min_delta: f64,
    /// Largest step magnitude
    pub max_delta: f64,
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
    /// Tick period for this metric; the view's period when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_ms: Option<u64>,
}

impl MetricSpec {
    /// Create a metric spec.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        initial: f64,
        min_delta: f64,
        max_delta: f64,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            name: name.into(),
            initial,
            min_delta,
            max_delta,
            min,
            max,
            tick_interval_ms: None,
        }
    }

    /// Give this metric its own tick period.
    #[must_use]
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = Some(interval_ms);
        self
    }
}

/// A scalar that moves by a bounded random step on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedRandomWalk {
    name: String,
    value: f64,
    min: f64,
    max: f64,
    min_delta: f64,
    max_delta: f64,
    ticks: u64,
}

/// Clamp without panicking on inverted or NaN bounds.
fn bound(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

impl BoundedRandomWalk {
    /// Create a walk from a spec.
    ///
    /// Inverted bounds or deltas are swapped and the initial value is clamped
    /// into range, so the bound invariant holds from construction on.
    #[must_use]
    pub fn new(spec: &MetricSpec) -> Self {
        let (min, max) = if spec.min > spec.max {
            (spec.max, spec.min)
        } else {
            (spec.min, spec.max)
        };
        let (min_delta, max_delta) = if spec.min_delta > spec.max_delta {
            (spec.max_delta, spec.min_delta)
        } else {
            (spec.min_delta, spec.max_delta)
        };
        Self {
            name: spec.name.clone(),
            value: bound(spec.initial, min, max),
            min,
            max,
            min_delta,
            max_delta,
            ticks: 0,
        }
    }

    /// Advance the walk by one step and return the new value.
    pub fn tick(&mut self, noise: &mut dyn NoiseSource) -> f64 {
        let magnitude = noise.range(self.min_delta, self.max_delta);
        let delta = if noise.coin() { magnitude } else { -magnitude };
        let candidate = bound(self.value + delta, self.min, self.max);
        // Fractional bounds can round outside the range, so bound again.
        self.value = bound(candidate.round(), self.min, self.max);
        self.ticks += 1;
        self.value
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Inclusive bounds `(min, max)`.
    #[must_use]
    pub const fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Number of ticks applied.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.ticks
    }
}
