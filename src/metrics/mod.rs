//! Prometheus metrics for pipeline runs.
//!
//! Metrics are process-global and cheap to update; registering them with
//! [`PROMETHEUS_REGISTRY`] is only needed when they are exported via
//! [`gather_metrics`].
//!
//! # Example
//! ```no_run
//! use abuser_recurrence_forecast::metrics::{init_metrics, gather_metrics, INCIDENTS_LOADED_TOTAL};
//!
//! init_metrics().ok();
//! INCIDENTS_LOADED_TOTAL.inc_by(3.0);
//! println!("{}", gather_metrics());
//! ```

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::Instant;

const NAMESPACE: &str = "recurrence_forecast";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Incident rows loaded and validated
    pub static ref INCIDENTS_LOADED_TOTAL: Counter = Counter::with_opts(
        Opts::new("incidents_loaded_total", "Incident rows loaded and validated")
            .namespace(NAMESPACE)
    ).expect("Failed to create INCIDENTS_LOADED_TOTAL metric");

    /// Abusers present in the latest metrics table
    pub static ref ABUSERS_PROFILED: Gauge = Gauge::with_opts(
        Opts::new("abusers_profiled", "Abusers present in the latest metrics table")
            .namespace(NAMESPACE)
    ).expect("Failed to create ABUSERS_PROFILED metric");

    /// Forecast rows produced
    pub static ref FORECASTS_TOTAL: Counter = Counter::with_opts(
        Opts::new("forecasts_total", "Forecast rows produced")
            .namespace(NAMESPACE)
    ).expect("Failed to create FORECASTS_TOTAL metric");

    /// Category values seen at prediction time but not during training
    ///
    /// Labels: field
    pub static ref UNSEEN_CATEGORIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("unseen_categories_total", "Category values unseen during training")
            .namespace(NAMESPACE),
        &["field"]
    ).expect("Failed to create UNSEEN_CATEGORIES_TOTAL metric");

    /// Mean absolute error on the held-out split of the last training run
    pub static ref HELD_OUT_MAE_DAYS: Gauge = Gauge::with_opts(
        Opts::new("held_out_mae_days", "Held-out mean absolute error in days")
            .namespace(NAMESPACE)
    ).expect("Failed to create HELD_OUT_MAE_DAYS metric");

    /// Stage duration in seconds
    ///
    /// Labels: stage
    pub static ref STAGE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("stage_duration_seconds", "Pipeline stage duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &["stage"]
    ).expect("Failed to create STAGE_DURATION_SECONDS metric");
}

/// Register all metrics with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(INCIDENTS_LOADED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ABUSERS_PROFILED.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(FORECASTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(UNSEEN_CATEGORIES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HELD_OUT_MAE_DAYS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(STAGE_DURATION_SECONDS.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Encode registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

/// Records the elapsed time of a stage when dropped
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        STAGE_DURATION_SECONDS
            .with_label_values(&[self.stage])
            .observe(elapsed);
        tracing::debug!(stage = self.stage, elapsed_secs = elapsed, "Stage finished");
    }
}
