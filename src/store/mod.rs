pub mod csv_store;
pub mod writer;

pub use csv_store::{
    parse_date, read_forecasts, read_incidents, read_metrics_table, REQUIRED_FORECAST_COLUMNS,
    REQUIRED_INCIDENT_COLUMNS, REQUIRED_METRICS_COLUMNS,
};
pub use writer::{commit_all, StagedArtifact};

use crate::error::{AppError, Result};
use crate::metrics::INCIDENTS_LOADED_TOTAL;
use crate::models::{ForecastResult, IncidentRecord, MetricsTable};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Source of a validated incident table
pub trait IncidentStore: Send + Sync {
    /// Load every incident; fails on schema violations before returning any rows
    fn load_incidents(&self) -> Result<Vec<IncidentRecord>>;

    /// Human-readable description of where incidents come from
    fn describe(&self) -> String;
}

/// Incident table backed by a CSV file
#[derive(Debug, Clone)]
pub struct CsvIncidentStore {
    path: PathBuf,
}

impl CsvIncidentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IncidentStore for CsvIncidentStore {
    fn load_incidents(&self) -> Result<Vec<IncidentRecord>> {
        let file = File::open(&self.path)?;
        let incidents = read_incidents(BufReader::new(file))?;
        ensure_not_empty(&incidents, &self.describe())?;

        INCIDENTS_LOADED_TOTAL.inc_by(incidents.len() as f64);
        info!(
            path = %self.path.display(),
            incidents = incidents.len(),
            "Incident table loaded"
        );
        Ok(incidents)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// In-memory incident store (for testing and embedding)
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    incidents: Vec<IncidentRecord>,
}

impl InMemoryStore {
    pub fn new(incidents: Vec<IncidentRecord>) -> Self {
        Self { incidents }
    }
}

impl IncidentStore for InMemoryStore {
    fn load_incidents(&self) -> Result<Vec<IncidentRecord>> {
        ensure_not_empty(&self.incidents, &self.describe())?;
        INCIDENTS_LOADED_TOTAL.inc_by(self.incidents.len() as f64);
        Ok(self.incidents.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Load a metrics table written by an earlier run
pub fn load_metrics_table(path: &Path) -> Result<MetricsTable> {
    let file = File::open(path)?;
    let table = read_metrics_table(BufReader::new(file))?;
    info!(path = %path.display(), abusers = table.len(), "Metrics table loaded");
    Ok(table)
}

/// Load a forecast table written by an earlier run
pub fn load_forecasts(path: &Path) -> Result<Vec<ForecastResult>> {
    let file = File::open(path)?;
    let forecasts = read_forecasts(BufReader::new(file))?;
    info!(path = %path.display(), forecasts = forecasts.len(), "Forecast table loaded");
    Ok(forecasts)
}

fn ensure_not_empty(incidents: &[IncidentRecord], source: &str) -> Result<()> {
    if incidents.is_empty() {
        return Err(AppError::InsufficientData(format!(
            "incident table {} has no rows",
            source
        )));
    }
    Ok(())
}
