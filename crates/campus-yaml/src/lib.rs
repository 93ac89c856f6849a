//! YAML manifest parser for the campus dashboard.
//!
//! A manifest configures the live KPIs, entity table size, analytics
//! controls and the preference directory:
//!
//! ```
//! use campus_yaml::DashboardManifest;
//!
//! let manifest = DashboardManifest::from_yaml("tick_interval_ms: 600\nentity_count: 32\n")?;
//! manifest.validate()?;
//! assert_eq!(manifest.composer_config().entity_count, 32);
//! # Ok::<(), campus_yaml::ParseError>(())
//! ```

mod error;
mod manifest;

pub use error::ParseError;
pub use manifest::{AnalyticsConfig, DashboardManifest, MatrixConfig};
