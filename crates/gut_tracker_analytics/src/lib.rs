//! Gut-health analytics engine.
//!
//! Records come in through [`gut_tracker_client::RecordRepository`]. The
//! [`aggregator`] rolls them up per calendar day and per domain, [`stats`]
//! supplies the numeric building blocks, [`patterns`] and [`domains`] derive
//! the cross-domain results, and [`AnalyticsService`] exposes the seven
//! analyses as plain serializable structures.

pub mod aggregator;
pub mod config;
pub mod domains;
pub mod error;
pub mod observability;
pub mod patterns;
pub mod service;
pub mod stats;
pub mod types;

mod test_utils;

pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, AnalyticsResult};
pub use service::{AnalysisKind, AnalysisReport, AnalyticsService, Clock, FetchContext};
pub use stats::{StatisticalSummary, TrendDirection};
pub use types::*;
