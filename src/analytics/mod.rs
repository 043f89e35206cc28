//! Per-abuser analytics
//!
//! - **Frequency**: incident counts and mean gap between incidents
//! - **Risk**: severity mean/max, hospitalization and arrest rates
//! - **Combiner**: the joined, rounded metrics table
//! - **Report**: high-risk view over the metrics and forecast tables

mod combiner;
mod frequency;
mod report;
mod risk;
mod statistics;

pub use combiner::{calculate_offender_metrics, combine_metrics, round_half_even};
pub use frequency::{
    calculate_incident_frequency, mean_gap_days, FrequencyStats, SINGLE_INCIDENT_GAP_DAYS,
};
pub use report::{
    build_risk_report, render, render_markdown, HighRiskAbuser, OblastSeverity, ReportFilter,
    ReportFormat, RiskReport, DEFAULT_MIN_SEVERITY,
};
pub use risk::{calculate_abuser_risk_metrics, RiskStats};
pub use statistics::{mean, percentile, Distribution};
