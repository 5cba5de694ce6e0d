//! Statistics, charts, heart-rate rewriting and TCX export for GPX activity files.

pub mod chart;
pub mod config;
pub mod error;
pub mod geo;
pub mod gpxxml;
pub mod heart_rate;
pub mod model;
pub mod series;
pub mod stats;
pub mod tcx;
pub mod units;

pub use config::Thresholds;
pub use error::GpxError;
pub use gpxxml::{load_activity, parse_activity};
pub use heart_rate::{HrGenerator, HrShape, replace_heart_rate_file, strip_heart_rate_file};
pub use model::{Activity, ExtensionNode, Segment, Track, TrackPoint, Waypoint};
pub use series::Sample;
pub use stats::{Stats, compute_stats};
pub use tcx::convert_file;
