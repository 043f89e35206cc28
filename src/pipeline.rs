//! End-to-end runs: incidents → metrics table → forecast table
//!
//! Every artifact of a run is staged next to its destination and committed
//! only after all stages succeeded, so a failed run writes nothing.

use crate::analytics::{build_risk_report, calculate_offender_metrics, ReportFilter, RiskReport};
use crate::config::Config;
use crate::error::Result;
use crate::metrics::{gather_metrics, StageTimer};
use crate::ml::{
    ensure_same_abusers, CategoryEncoder, FeatureBuilder, ForecastModel, IncidentForecaster,
    ModelConfig, ModelMetadata, ModelType, RegressionMetrics, UnseenCategory,
};
use crate::models::{ForecastResult, IncidentRecord, MetricsTable, OffenderMetrics};
use crate::store::{commit_all, load_forecasts, load_metrics_table, IncidentStore, StagedArtifact};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Summary of one model fit
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model_type: ModelType,
    pub training_rows: usize,
    pub held_out_rows: usize,

    /// Absent when the corpus was too small to hold out a test set
    pub evaluation: Option<RegressionMetrics>,

    pub hyperparameters: BTreeMap<String, String>,
}

impl From<&ModelMetadata> for TrainingReport {
    fn from(metadata: &ModelMetadata) -> Self {
        Self {
            model_type: metadata.model_type,
            training_rows: metadata.n_training_samples,
            held_out_rows: metadata
                .validation_metrics
                .map(|m| m.n_samples)
                .unwrap_or(0),
            evaluation: metadata.validation_metrics,
            hyperparameters: metadata.hyperparameters.clone(),
        }
    }
}

/// Forecast table plus what was learned producing it
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub forecasts: Vec<ForecastResult>,
    pub unseen_categories: Vec<UnseenCategory>,
    pub training: TrainingReport,
}

/// Result of a full run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub metrics: MetricsTable,
    pub forecast: ForecastRun,

    /// Files written, in commit order
    pub written: Vec<PathBuf>,
}

/// Per-abuser metrics table for an incident table
pub fn compute_metrics(incidents: &[IncidentRecord]) -> Result<MetricsTable> {
    calculate_offender_metrics(incidents)
}

/// Train on `incidents` joined with `metrics`, then forecast each abuser's
/// next incident.
pub fn compute_forecasts(
    incidents: &[IncidentRecord],
    metrics: &MetricsTable,
    config: &ModelConfig,
) -> Result<ForecastRun> {
    let encoder = CategoryEncoder::fit(incidents);
    let training = FeatureBuilder::new(metrics, &encoder).training_set(incidents)?;

    let model = {
        let _timer = StageTimer::start("train");
        ForecastModel::train(&training, encoder, config)?
    };

    let output = IncidentForecaster::new(&model).forecast(incidents, metrics)?;

    Ok(ForecastRun {
        forecasts: output.forecasts,
        unseen_categories: output.unseen_categories,
        training: TrainingReport::from(model.metadata()),
    })
}

/// Runs the stages against configured paths
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics and forecasts in one go; both tables are committed together
    pub fn run(&self, store: &dyn IncidentStore) -> Result<PipelineOutput> {
        info!(source = %store.describe(), "Starting full run");
        let incidents = store.load_incidents()?;

        let metrics = compute_metrics(&incidents)?;
        let forecast = compute_forecasts(&incidents, &metrics, &self.config.model)?;

        let written = self.persist(Some(&metrics), Some(&forecast.forecasts))?;
        Ok(PipelineOutput {
            metrics,
            forecast,
            written,
        })
    }

    /// Metrics stage only: writes the metrics table
    pub fn run_metrics(&self, store: &dyn IncidentStore) -> Result<MetricsTable> {
        info!(source = %store.describe(), "Starting metrics run");
        let incidents = store.load_incidents()?;
        let metrics = compute_metrics(&incidents)?;
        self.persist(Some(&metrics), None)?;
        Ok(metrics)
    }

    /// Forecast stage only: reads the metrics table written by an earlier
    /// metrics run and writes the forecast table
    pub fn run_forecast(&self, store: &dyn IncidentStore) -> Result<ForecastRun> {
        info!(source = %store.describe(), "Starting forecast run");
        let incidents = store.load_incidents()?;
        let metrics = load_metrics_table(&self.config.paths.metrics_output)?;
        ensure_same_abusers(&incidents, &metrics)?;

        let forecast = compute_forecasts(&incidents, &metrics, &self.config.model)?;
        self.persist(None, Some(&forecast.forecasts))?;
        Ok(forecast)
    }

    /// Risk report over the incident table and the persisted metrics and
    /// forecast tables
    pub fn report(&self, store: &dyn IncidentStore, filter: &ReportFilter) -> Result<RiskReport> {
        let incidents = store.load_incidents()?;
        let metrics = load_metrics_table(&self.config.paths.metrics_output)?;
        let forecasts = load_forecasts(&self.config.paths.forecast_output)?;
        build_risk_report(&incidents, &metrics, &forecasts, filter)
    }

    fn persist(
        &self,
        metrics: Option<&MetricsTable>,
        forecasts: Option<&[ForecastResult]>,
    ) -> Result<Vec<PathBuf>> {
        let paths = &self.config.paths;
        let mut staged = Vec::new();

        if let Some(metrics) = metrics {
            let rows: Vec<OffenderMetrics> = metrics.iter().cloned().collect();
            staged.push(StagedArtifact::csv(&paths.metrics_output, &rows)?);
        }
        if let Some(forecasts) = forecasts {
            staged.push(StagedArtifact::csv(&paths.forecast_output, forecasts)?);
        }
        if let Some(export) = &paths.metrics_export {
            if self.config.observability.prometheus_enabled {
                staged.push(StagedArtifact::from_bytes(
                    export,
                    gather_metrics().as_bytes(),
                )?);
            }
        }

        commit_all(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;

    fn incident(abuser_id: &str, date: &str, severity: u8) -> IncidentRecord {
        IncidentRecord {
            abuser_id: abuser_id.to_string(),
            victim_id: None,
            incident_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            abuser_dob: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            abuser_gender: None,
            incident_type: "Physical".to_string(),
            relationship: "Spouse".to_string(),
            oblast: "Kyiv".to_string(),
            severity,
            victim_outcome: "None".to_string(),
            abuser_outcome: "None".to_string(),
        }
    }

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.paths.metrics_output = dir.join("metrics.csv");
        config.paths.forecast_output = dir.join("forecast.csv");
        config.model.n_estimators = 10;
        config
    }

    #[test]
    fn test_training_report_from_metadata() {
        let metadata = ModelMetadata {
            name: "m".to_string(),
            model_type: ModelType::RandomForest,
            trained_at: chrono::Utc::now(),
            n_training_samples: 8,
            n_features: 10,
            validation_metrics: Some(RegressionMetrics::from_predictions(&[1.0, 2.0], &[1.0, 2.0])),
            hyperparameters: BTreeMap::new(),
        };
        let report = TrainingReport::from(&metadata);
        assert_eq!(report.training_rows, 8);
        assert_eq!(report.held_out_rows, 2);
    }

    #[test]
    fn test_run_writes_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()));
        let store = InMemoryStore::new(vec![
            incident("A1", "2023-01-01", 5),
            incident("A1", "2023-03-02", 7),
            incident("B2", "2023-02-01", 3),
        ]);

        let output = pipeline.run(&store).unwrap();
        assert_eq!(output.metrics.len(), 2);
        assert_eq!(output.forecast.forecasts.len(), 2);
        assert_eq!(output.written.len(), 2);
        assert!(dir.path().join("metrics.csv").exists());
        assert!(dir.path().join("forecast.csv").exists());
    }

    #[test]
    fn test_forecast_without_metrics_table_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()));
        let store = InMemoryStore::new(vec![incident("A1", "2023-01-01", 5)]);

        assert!(matches!(pipeline.run_forecast(&store), Err(AppError::Io(_))));
        assert!(!dir.path().join("forecast.csv").exists());
    }

    #[test]
    fn test_failed_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()));

        assert!(pipeline.run(&InMemoryStore::default()).is_err());
        assert!(!dir.path().join("metrics.csv").exists());
        assert!(!dir.path().join("forecast.csv").exists());
    }
}
