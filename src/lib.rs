//! Abuser recurrence forecasting
//!
//! Batch pipeline over domestic-violence incident records:
//!
//! - **store**: validated loading of the incident table, atomic artifact writes
//! - **analytics**: per-abuser frequency and risk metrics, the combined
//!   metrics table, and the high-risk report
//! - **ml**: feature construction, random forest regression and
//!   next-incident forecasting
//! - **pipeline**: the metrics, forecast and full runs

pub mod analytics;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod store;

pub use error::{AppError, Result};
pub use pipeline::{compute_forecasts, compute_metrics, ForecastRun, Pipeline, PipelineOutput};
