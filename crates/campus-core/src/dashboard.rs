//! View composition: live KPIs, datasets and the entity table per view.
//!
//! [`DashboardComposer`] owns the scheduler, the noise source, the entity
//! store and the output sinks. Exactly one [`View`] is active at a time.
//! Activating a view deactivates the previous one first, so no timer
//! outlives the view that created it.

use crate::entity::{EntityRecord, EntityStore};
use crate::error::CoreError;
use crate::live::MetricSpec;
use crate::noise::NoiseSource;
use crate::projection::{ProjectionCache, ProjectionStats, ViewFilterState};
use crate::scheduler::{TickEvent, TickScheduler, TimerId, ViewScope, DEFAULT_TICK_INTERVAL_MS};
use crate::series::{
    self, clamp_accuracy, clamp_threshold, OperatingMode, SeriesKind, SeriesParams, SeriesPoint,
    DEFAULT_ACCURACY, DEFAULT_THRESHOLD, MATRIX_COLS, MATRIX_ROWS,
};
use crate::sink::{
    export_report, ChartKind, Encoding, ExportSink, MemoryExportSink, PlotSink, RecordingPlotSink,
    ReportKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Entity count seeded when none is configured.
pub const DEFAULT_ENTITY_COUNT: usize = 16;

/// Name of the KPI that drives [`OperatingMode`].
pub const SOLAR_KW_METRIC: &str = "solar_kw";

/// Points shown in the overview water level sparkline.
const LEVEL_WINDOW: usize = 12;

/// Dashboard pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Live KPIs and the hourly energy chart
    Overview,
    /// ML timeline prediction datasets
    Timeline,
    /// Predictive analytics with accuracy control
    Analytics,
    /// Entity resolution table
    Entities,
    /// Security trends and report download
    Security,
}

impl View {
    /// Every view, in navigation order.
    pub const ALL: [Self; 5] = [
        Self::Overview,
        Self::Timeline,
        Self::Analytics,
        Self::Entities,
        Self::Security,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Timeline => "timeline",
            Self::Analytics => "analytics",
            Self::Entities => "entities",
            Self::Security => "security",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for View {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| CoreError::UnknownView(s.to_string()))
    }
}

/// The eight overview KPIs.
#[must_use]
pub fn default_kpis() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new("total_solar", 125_000.0, 100.0, 800.0, 100_000.0, 300_000.0),
        MetricSpec::new("diesel_saved", 830.0, 1.0, 5.0, 600.0, 2000.0),
        MetricSpec::new("cost_saved", 215_000.0, 500.0, 2000.0, 150_000.0, 600_000.0),
        MetricSpec::new("carbon_reduced", 72.0, 0.1, 0.6, 50.0, 200.0),
        MetricSpec::new("total_dewatered", 12_800.0, 5.0, 40.0, 8000.0, 50_000.0),
        MetricSpec::new(SOLAR_KW_METRIC, 420.0, 5.0, 20.0, 100.0, 800.0),
        MetricSpec::new("active_pumps", 11.0, 0.0, 1.0, 0.0, 16.0),
        MetricSpec::new("water_depth", 38.0, 0.1, 0.6, 15.0, 60.0),
    ]
}

/// Composer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Live KPI tick period
    pub tick_interval_ms: u64,
    /// Entities seeded into the store
    pub entity_count: usize,
    /// Overview KPIs
    pub metrics: Vec<MetricSpec>,
    /// Initial analytics accuracy
    pub accuracy: f64,
    /// Initial anomaly threshold
    pub threshold: f64,
    /// Correlation matrix rows
    pub matrix_rows: usize,
    /// Correlation matrix columns
    pub matrix_cols: usize,
    /// Fixed closing hour for hourly labels; wall clock when `None`
    pub now_hour: Option<u32>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            entity_count: DEFAULT_ENTITY_COUNT,
            metrics: default_kpis(),
            accuracy: DEFAULT_ACCURACY,
            threshold: DEFAULT_THRESHOLD,
            matrix_rows: MATRIX_ROWS,
            matrix_cols: MATRIX_COLS,
            now_hour: None,
        }
    }
}

/// One KPI value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReading {
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Current KPI values of the active view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    /// Logical time of the reading
    pub at_ms: u64,
    /// Values in configuration order
    pub readings: Vec<KpiReading>,
    /// Power mode derived from `solar_kw`, when that KPI is live
    pub mode: Option<OperatingMode>,
}

impl KpiSnapshot {
    /// Look up one reading by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.readings.iter().find(|r| r.name == name).map(|r| r.value)
    }

    /// Pretty JSON form.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug)]
struct ActiveView {
    view: View,
    scope: ViewScope,
    kpis: Vec<TimerId>,
}

/// Drives the dashboard views.
pub struct DashboardComposer<P = RecordingPlotSink, E = MemoryExportSink> {
    config: ComposerConfig,
    scheduler: TickScheduler,
    noise: Box<dyn NoiseSource>,
    store: EntityStore,
    cache: ProjectionCache,
    filter: ViewFilterState,
    active: Option<ActiveView>,
    datasets: Vec<(String, Vec<SeriesPoint>)>,
    accuracy: f64,
    threshold: f64,
    plot_sink: P,
    export_sink: E,
}

impl DashboardComposer<RecordingPlotSink, MemoryExportSink> {
    /// Composer with in-memory sinks.
    pub fn recording(config: ComposerConfig, noise: impl NoiseSource + 'static) -> Self {
        Self::new(config, noise, RecordingPlotSink::new(), MemoryExportSink::new())
    }
}

impl<P: PlotSink, E: ExportSink> DashboardComposer<P, E> {
    /// Create a composer and seed the entity store. No view is active.
    pub fn new(config: ComposerConfig, noise: impl NoiseSource + 'static, plot_sink: P, export_sink: E) -> Self {
        let mut noise: Box<dyn NoiseSource> = Box::new(noise);
        let store = EntityStore::initialize(config.entity_count, noise.as_mut());
        let accuracy = clamp_accuracy(config.accuracy);
        let threshold = clamp_threshold(config.threshold);
        Self {
            config,
            scheduler: TickScheduler::new(),
            noise,
            store,
            cache: ProjectionCache::new(),
            filter: ViewFilterState::default(),
            active: None,
            datasets: Vec::new(),
            accuracy,
            threshold,
            plot_sink,
            export_sink,
        }
    }

    /// Make `view` the active view.
    ///
    /// The previous view is deactivated first, the entity filter is reset
    /// and every dataset of the new view is regenerated and plotted.
    pub fn activate(&mut self, view: View) {
        self.deactivate();
        self.filter = ViewFilterState::default();

        let mut scope = self.scheduler.open_scope(view.name());
        let mut kpis = Vec::new();
        if view == View::Overview {
            for spec in &self.config.metrics {
                let interval_ms = spec.tick_interval_ms.unwrap_or(self.config.tick_interval_ms);
                kpis.push(self.scheduler.register(&mut scope, spec, interval_ms));
            }
        }
        info!(view = %view, timers = kpis.len(), "view activated");
        self.active = Some(ActiveView { view, scope, kpis });
        self.render(view);
    }

    /// Deactivate the current view, cancelling its timers.
    ///
    /// Returns the number of timers cancelled.
    pub fn deactivate(&mut self) -> usize {
        let Some(active) = self.active.take() else {
            return 0;
        };
        self.datasets.clear();
        self.scheduler.deactivate(active.scope)
    }

    /// Currently active view.
    #[must_use]
    pub fn view(&self) -> Option<View> {
        self.active.as_ref().map(|a| a.view)
    }

    /// Advance the logical clock by `delta_ms`.
    pub fn advance(&mut self, delta_ms: u64) -> Vec<TickEvent> {
        self.scheduler.advance_by(delta_ms, self.noise.as_mut())
    }

    /// KPI values of the active view. Empty outside the overview.
    #[must_use]
    pub fn kpis(&self) -> KpiSnapshot {
        let readings: Vec<KpiReading> = self
            .active
            .iter()
            .flat_map(|a| a.kpis.iter())
            .filter_map(|id| self.scheduler.walk(*id))
            .map(|walk| {
                let (min, max) = walk.bounds();
                KpiReading {
                    name: walk.name().to_string(),
                    value: walk.value(),
                    min,
                    max,
                }
            })
            .collect();
        let mode = readings
            .iter()
            .find(|r| r.name == SOLAR_KW_METRIC)
            .map(|r| OperatingMode::from_solar_kw(r.value));
        KpiSnapshot {
            at_ms: self.scheduler.now_ms(),
            readings,
            mode,
        }
    }

    /// Datasets generated for the active view, by chart id.
    #[must_use]
    pub fn datasets(&self) -> &[(String, Vec<SeriesPoint>)] {
        &self.datasets
    }

    /// One dataset of the active view.
    #[must_use]
    pub fn dataset(&self, chart: &str) -> Option<&[SeriesPoint]> {
        self.datasets
            .iter()
            .find(|(name, _)| name == chart)
            .map(|(_, points)| points.as_slice())
    }

    /// Current entity filter.
    #[must_use]
    pub const fn filter(&self) -> &ViewFilterState {
        &self.filter
    }

    /// Replace the entity filter.
    pub fn set_filter(&mut self, filter: ViewFilterState) {
        self.filter = filter;
    }

    /// Set one entity's `active` flag. Returns `false` for an unknown id.
    pub fn set_active(&mut self, id: u32, value: bool) -> bool {
        self.store.set_active(id, value)
    }

    /// Flip one entity's `active` flag.
    pub fn toggle_entity(&mut self, id: u32) -> Option<bool> {
        self.store.toggle(id)
    }

    /// Entities visible under the current filter.
    pub fn visible(&mut self) -> &[EntityRecord] {
        self.cache.get_or_project(&self.store, &self.filter)
    }

    /// Entity store.
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Projection cache counters.
    #[must_use]
    pub const fn cache_stats(&self) -> ProjectionStats {
        self.cache.stats()
    }

    /// Analytics accuracy control.
    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Set the accuracy control (clamped to 50..=100) and return the
    /// stored value. Replots the analytics view when it is active.
    pub fn set_accuracy(&mut self, value: f64) -> f64 {
        self.accuracy = clamp_accuracy(value);
        if self.view() == Some(View::Analytics) {
            self.render(View::Analytics);
        }
        self.accuracy
    }

    /// Anomaly threshold control.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Set the anomaly threshold (clamped to 0..=60) and return the stored
    /// value.
    pub fn set_threshold(&mut self, value: f64) -> f64 {
        self.threshold = clamp_threshold(value);
        self.threshold
    }

    /// Export the placeholder security report. Returns the file name.
    pub fn export(&mut self, kind: ReportKind) -> Result<String, CoreError> {
        export_report(kind, &mut self.export_sink)
    }

    /// Scheduler driving the live KPIs.
    #[must_use]
    pub const fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// Plot sink.
    #[must_use]
    pub const fn plot_sink(&self) -> &P {
        &self.plot_sink
    }

    /// Export sink.
    #[must_use]
    pub const fn export_sink(&self) -> &E {
        &self.export_sink
    }

    fn params(&self) -> SeriesParams {
        let params = SeriesParams::default()
            .with_matrix(self.config.matrix_rows, self.config.matrix_cols)
            .with_accuracy(self.accuracy);
        match self.config.now_hour {
            Some(hour) => params.with_now_hour(hour),
            None => params,
        }
    }

    fn render(&mut self, view: View) {
        let params = self.params();
        let noise = self.noise.as_mut();
        let mut charts: Vec<(Encoding, Vec<SeriesPoint>)> = Vec::new();

        match view {
            View::Overview => {
                let hourly = series::generate(SeriesKind::Hourly, &params, noise);
                let tail = hourly[hourly.len().saturating_sub(LEVEL_WINDOW)..].to_vec();
                charts.push((
                    Encoding::new("water_level", ChartKind::Line, "time").series("level"),
                    tail,
                ));
                charts.push((Encoding::new("solar", ChartKind::Area, "time").series("solar"), hourly.clone()));
                charts.push((Encoding::new("pumps", ChartKind::Line, "time").series("pump"), hourly));
            }
            View::Timeline => {
                let prediction = series::generate(SeriesKind::Prediction, &params, noise);
                charts.push((
                    Encoding::new("prediction_band", ChartKind::Area, "t")
                        .series("low")
                        .series("high"),
                    prediction.clone(),
                ));
                charts.push((
                    Encoding::new("prediction", ChartKind::Line, "t")
                        .series("actual")
                        .series("predicted"),
                    prediction,
                ));
                let forecast = series::generate(SeriesKind::Forecast, &params, noise);
                charts.push((
                    Encoding::new("forecast", ChartKind::Line, "hour").series("activities"),
                    forecast,
                ));
                let angle = series::generate(SeriesKind::SolarAngle, &params, noise);
                charts.push((Encoding::new("solar_angle", ChartKind::Line, "hour").series("angle"), angle));
                let features = series::generate(SeriesKind::Features, &params, noise);
                charts.push((
                    Encoding::new("features", ChartKind::Bar, "name").series("importance"),
                    features,
                ));
                let matrix = series::generate(SeriesKind::Matrix, &params, noise);
                charts.push((Encoding::new("correlation", ChartKind::Heatmap, "key").series("value"), matrix));
                let training = series::generate(SeriesKind::Training, &params, noise);
                charts.push((Encoding::new("training", ChartKind::Line, "e").series("loss"), training));
            }
            View::Analytics => {
                let analytics = series::generate(SeriesKind::Analytics, &params, noise);
                charts.push((
                    Encoding::new("analytics", ChartKind::Line, "h")
                        .series("predictions")
                        .series("anomalies"),
                    analytics,
                ));
            }
            View::Entities => {}
            View::Security => {
                let alerts = series::generate(SeriesKind::Security, &params, noise);
                charts.push((Encoding::new("security_alerts", ChartKind::Area, "month").series("alerts"), alerts));
                let anomalies = series::generate(SeriesKind::Anomalies, &params, noise);
                charts.push((
                    Encoding::new("anomalies_detected", ChartKind::Line, "month").series("detected"),
                    anomalies,
                ));
            }
        }

        self.datasets.clear();
        for (encoding, points) in charts {
            self.plot_sink.plot(&points, &encoding);
            self.datasets.push((encoding.chart, points));
        }
        debug!(view = %view, charts = self.datasets.len(), "view rendered");
    }
}

impl<P, E> Drop for DashboardComposer<P, E> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            self.scheduler.deactivate(active.scope);
        }
    }
}

impl<P, E> fmt::Debug for DashboardComposer<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardComposer")
            .field("view", &self.active.as_ref().map(|a| a.view))
            .field("entities", &self.store.len())
            .field("accuracy", &self.accuracy)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::SeededNoise;
    use crate::projection::{SortKey, StatusFilter, TypeFilter};

    fn composer() -> DashboardComposer {
        let config = ComposerConfig {
            now_hour: Some(12),
            ..ComposerConfig::default()
        };
        DashboardComposer::recording(config, SeededNoise::new(7))
    }

    #[test]
    fn test_view_parse() {
        assert_eq!("Overview".parse::<View>().ok(), Some(View::Overview));
        assert_eq!("security".parse::<View>().ok(), Some(View::Security));
        assert!(matches!("admin".parse::<View>(), Err(CoreError::UnknownView(_))));
        assert_eq!(View::Timeline.to_string(), "timeline");
    }

    #[test]
    fn test_default_kpis() {
        let kpis = default_kpis();
        assert_eq!(kpis.len(), 8);
        assert_eq!(kpis[0].name, "total_solar");
        assert!(kpis.iter().any(|k| k.name == SOLAR_KW_METRIC));
    }

    #[test]
    fn test_new_seeds_entities_without_view() {
        let c = composer();
        assert_eq!(c.store().len(), DEFAULT_ENTITY_COUNT);
        assert_eq!(c.view(), None);
        assert!(c.kpis().readings.is_empty());
        assert_eq!(c.scheduler().active_timers(), 0);
    }

    #[test]
    fn test_overview_registers_kpis_and_plots() {
        let mut c = composer();
        c.activate(View::Overview);
        assert_eq!(c.scheduler().active_timers(), 8);
        let snapshot = c.kpis();
        assert_eq!(snapshot.readings.len(), 8);
        assert_eq!(snapshot.get("solar_kw"), Some(420.0));
        assert_eq!(snapshot.mode, Some(OperatingMode::Solar));

        assert_eq!(c.dataset("solar").map(<[SeriesPoint]>::len), Some(24));
        assert_eq!(c.dataset("water_level").map(<[SeriesPoint]>::len), Some(12));
        assert_eq!(c.plot_sink().call_count(), 3);
        let last = c.dataset("solar").and_then(|d| d.last()).map(SeriesPoint::label);
        assert_eq!(last.as_deref(), Some("12:00"));
    }

    #[test]
    fn test_ticks_stay_in_bounds() {
        let mut c = composer();
        c.activate(View::Overview);
        let events = c.advance(1200 * 50);
        assert_eq!(events.len(), 8 * 50);
        for reading in c.kpis().readings {
            assert!(reading.value >= reading.min && reading.value <= reading.max);
        }
    }

    #[test]
    fn test_switching_view_cancels_timers() {
        let mut c = composer();
        c.activate(View::Overview);
        c.advance(2400);
        let ticks = c.scheduler().total_ticks();
        c.activate(View::Security);
        assert_eq!(c.scheduler().active_timers(), 0);
        assert!(c.advance(60_000).is_empty());
        assert_eq!(c.scheduler().total_ticks(), ticks);
        assert!(c.kpis().readings.is_empty());
    }

    #[test]
    fn test_timeline_datasets() {
        let mut c = composer();
        c.activate(View::Timeline);
        assert_eq!(c.datasets().len(), 7);
        assert_eq!(c.dataset("correlation").map(<[SeriesPoint]>::len), Some(96));
        assert_eq!(c.dataset("features").map(<[SeriesPoint]>::len), Some(6));
        assert_eq!(c.dataset("training").map(<[SeriesPoint]>::len), Some(30));
    }

    #[test]
    fn test_timeline_chart_encodings() {
        let mut c = composer();
        c.activate(View::Timeline);
        let kind = |chart: &str| c.plot_sink().latest(chart).map(|call| call.encoding.kind);
        assert_eq!(kind("prediction"), Some(ChartKind::Line));
        assert_eq!(kind("prediction_band"), Some(ChartKind::Area));
        assert_eq!(kind("forecast"), Some(ChartKind::Line));
        assert_eq!(kind("features"), Some(ChartKind::Bar));

        let fields = |chart: &str| c.plot_sink().latest(chart).map(|call| call.encoding.y.clone());
        assert_eq!(fields("prediction"), Some(vec!["actual".to_string(), "predicted".to_string()]));
        assert_eq!(fields("prediction_band"), Some(vec!["low".to_string(), "high".to_string()]));
        assert_eq!(c.dataset("prediction"), c.dataset("prediction_band"));
    }

    #[test]
    fn test_metric_interval_overrides_default() {
        let config = ComposerConfig {
            now_hour: Some(12),
            metrics: vec![
                MetricSpec::new("solar_kw", 420.0, 5.0, 20.0, 100.0, 800.0),
                MetricSpec::new("battery_pct", 80.0, 1.0, 2.0, 0.0, 100.0).with_interval(500),
            ],
            ..ComposerConfig::default()
        };
        let mut c = DashboardComposer::recording(config, SeededNoise::new(7));
        c.activate(View::Overview);

        let events = c.advance(1200);
        let solar = events.iter().filter(|e| e.metric == "solar_kw").count();
        let battery: Vec<u64> = events
            .iter()
            .filter(|e| e.metric == "battery_pct")
            .map(|e| e.at_ms)
            .collect();
        assert_eq!(solar, 1);
        assert_eq!(battery, vec![500, 1000]);
    }

    #[test]
    fn test_accuracy_clamped_and_replotted() {
        let mut c = composer();
        c.activate(View::Analytics);
        let calls = c.plot_sink().call_count();
        assert!((c.set_accuracy(150.0) - 100.0).abs() < f64::EPSILON);
        assert_eq!(c.plot_sink().call_count(), calls + 1);
        assert!((c.set_threshold(-5.0)).abs() < f64::EPSILON);
        assert_eq!(c.plot_sink().call_count(), calls + 1);
    }

    #[test]
    fn test_accuracy_outside_analytics_does_not_plot() {
        let mut c = composer();
        c.activate(View::Security);
        let calls = c.plot_sink().call_count();
        c.set_accuracy(60.0);
        assert_eq!(c.plot_sink().call_count(), calls);
        assert!((c.accuracy() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_filter_reset_on_activation() {
        let mut c = composer();
        c.activate(View::Entities);
        c.set_filter(ViewFilterState::new(
            StatusFilter::Inactive,
            TypeFilter::Visitor,
            SortKey::Confidence,
        ));
        c.activate(View::Entities);
        assert_eq!(c.filter(), &ViewFilterState::default());
    }

    #[test]
    fn test_visible_reflects_set_active() {
        let mut c = composer();
        c.activate(View::Entities);
        c.set_filter(ViewFilterState::new(StatusFilter::Inactive, TypeFilter::All, SortKey::Id));
        assert!(c.set_active(5, false));
        assert!(c.visible().iter().any(|r| r.id == 5));
        assert!(c.set_active(5, true));
        assert!(!c.visible().iter().any(|r| r.id == 5));
        assert!(!c.set_active(500, true));
    }

    #[test]
    fn test_export_goes_to_sink() {
        let mut c = composer();
        c.activate(View::Security);
        let name = c.export(ReportKind::Pdf).expect("export");
        assert_eq!(name, "security-report.pdf");
        assert_eq!(c.export_sink().files().len(), 1);
    }

    #[test]
    fn test_snapshot_json() {
        let mut c = composer();
        c.activate(View::Overview);
        let json = c.kpis().to_json().expect("json");
        assert!(json.contains("\"solar_kw\""));
        assert!(json.contains("\"Solar\""));
    }
}
