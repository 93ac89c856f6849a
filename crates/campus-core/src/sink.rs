//! Output collaborators: chart rendering and report download.
//!
//! The core never draws or writes files itself. It hands fully
//! materialized data to a [`PlotSink`] and report text to an
//! [`ExportSink`].

use crate::error::CoreError;
use crate::series::SeriesPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Chart type variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Line chart
    #[default]
    Line,
    /// Area chart
    Area,
    /// Bar chart
    Bar,
    /// Heatmap - displays matrix data with color encoding
    Heatmap,
}

/// How a dataset maps onto a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    /// Chart identifier within the view
    pub chart: String,
    /// Chart type
    pub kind: ChartKind,
    /// Field used for the category axis
    pub x: String,
    /// Numeric fields drawn as series
    pub y: Vec<String>,
}

impl Encoding {
    /// Create an encoding.
    #[must_use]
    pub fn new(chart: impl Into<String>, kind: ChartKind, x: impl Into<String>) -> Self {
        Self {
            chart: chart.into(),
            kind,
            x: x.into(),
            y: Vec::new(),
        }
    }

    /// Add a series field.
    #[must_use]
    pub fn series(mut self, field: impl Into<String>) -> Self {
        self.y.push(field.into());
        self
    }
}

/// Receives datasets to render.
pub trait PlotSink {
    /// Render a dataset with the given encoding.
    fn plot(&mut self, series: &[SeriesPoint], encoding: &Encoding);
}

/// One recorded plot call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotCall {
    pub encoding: Encoding,
    pub points: Vec<SeriesPoint>,
}

/// Plot sink that keeps every call, for tests and JSON output.
#[derive(Debug, Clone, Default)]
pub struct RecordingPlotSink {
    calls: Vec<PlotCall>,
}

impl RecordingPlotSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> &[PlotCall] {
        &self.calls
    }

    /// Most recent call for a chart id.
    #[must_use]
    pub fn latest(&self, chart: &str) -> Option<&PlotCall> {
        self.calls.iter().rev().find(|c| c.encoding.chart == chart)
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Remove and return every recorded call.
    pub fn drain(&mut self) -> Vec<PlotCall> {
        std::mem::take(&mut self.calls)
    }
}

impl PlotSink for RecordingPlotSink {
    fn plot(&mut self, series: &[SeriesPoint], encoding: &Encoding) {
        self.calls.push(PlotCall {
            encoding: encoding.clone(),
            points: series.to_vec(),
        });
    }
}

/// Downloadable report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Csv,
    Pdf,
}

impl ReportKind {
    /// File extension and display name.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }

    /// Download file name.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("security-report.{}", self.extension())
    }

    /// Placeholder report body.
    #[must_use]
    pub fn placeholder_content(self) -> String {
        format!("Mock Security {} Report", self.extension())
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "pdf" => Ok(Self::Pdf),
            _ => Err(CoreError::UnknownReport(s.to_string())),
        }
    }
}

/// Receives files to hand to the user.
pub trait ExportSink {
    /// Deliver `content` under `file_name`.
    fn export(&mut self, file_name: &str, content: &str) -> Result<(), CoreError>;
}

/// Send the placeholder security report of `kind` to `sink`.
///
/// Returns the file name used.
pub fn export_report(kind: ReportKind, sink: &mut dyn ExportSink) -> Result<String, CoreError> {
    let file_name = kind.file_name();
    sink.export(&file_name, &kind.placeholder_content())?;
    info!(file = %file_name, "report exported");
    Ok(file_name)
}

/// Export sink that writes files into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryExportSink {
    dir: PathBuf,
}

impl DirectoryExportSink {
    /// Write exports into `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectoryExportSink {
    fn export(&mut self, file_name: &str, content: &str) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(file_name), content)?;
        Ok(())
    }
}

/// Export sink that keeps files in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryExportSink {
    files: Vec<(String, String)>,
}

impl MemoryExportSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exported `(file_name, content)` pairs in order.
    #[must_use]
    pub fn files(&self) -> &[(String, String)] {
        &self.files
    }
}

impl ExportSink for MemoryExportSink {
    fn export(&mut self, file_name: &str, content: &str) -> Result<(), CoreError> {
        self.files.push((file_name.to_string(), content.to_string()));
        Ok(())
    }
}
