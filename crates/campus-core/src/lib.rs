//! Simulation core for the campus data integration dashboard.
//!
//! This crate provides the data layer behind every dashboard view:
//! - Live KPIs: [`BoundedRandomWalk`] ticked by a [`TickScheduler`]
//! - Datasets: [`SeriesSynthesizer`] producing [`SeriesPoint`] sequences
//! - Entity resolution table: [`EntityStore`] with filter/sort [`project`]ion
//! - Output collaborators: [`PlotSink`], [`ExportSink`], [`Storage`]
//! - View wiring: [`DashboardComposer`]
//!
//! All randomness flows through an injectable [`NoiseSource`], so every
//! component is reproducible under [`SeededNoise`].

pub mod dashboard;
pub mod entity;
mod error;
pub mod live;
pub mod noise;
pub mod projection;
pub mod scheduler;
pub mod series;
pub mod sink;
pub mod storage;

pub use dashboard::{default_kpis, ComposerConfig, DashboardComposer, KpiReading, KpiSnapshot, View};
pub use entity::{EntityRecord, EntityStore, EntityType};
pub use error::CoreError;
pub use live::{BoundedRandomWalk, MetricSpec};
pub use noise::{NoiseSource, RandomNoise, SeededNoise, SequenceNoise};
pub use projection::{project, ProjectionCache, SortKey, StatusFilter, TypeFilter, ViewFilterState};
pub use scheduler::{
    TickEvent, TickScheduler, TimerId, ViewScope, DEFAULT_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS,
};
pub use series::{OperatingMode, SeriesKind, SeriesParams, SeriesPoint, SeriesSynthesizer};
pub use sink::{
    export_report, ChartKind, DirectoryExportSink, Encoding, ExportSink, MemoryExportSink, PlotSink,
    RecordingPlotSink, ReportKind,
};
pub use storage::{FileStorage, MemoryStorage, Storage, ThemePreference, THEME_KEY};
