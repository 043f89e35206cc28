//! Feature rows for training and prediction
//!
//! Training uses one row per incident labelled with the abuser's average
//! gap. Prediction uses one row per abuser built from the latest incident.

use crate::error::{AppError, Result};
use crate::ml::encoder::{CategoryEncoder, UnseenCategory};
use crate::models::{IncidentRecord, MetricsTable};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use tracing::debug;

/// Feature columns, in matrix order
pub const FEATURE_COLUMNS: [&str; 10] = [
    "incident_count",
    "avg_days_between_incidents",
    "avg_severity",
    "max_severity",
    "hospitalization_rate",
    "arrest_rate",
    "offender_age",
    "incident_type_code",
    "relationship_code",
    "region_code",
];

/// Number of features per row
pub const N_FEATURES: usize = FEATURE_COLUMNS.len();

/// Feature matrix with the abuser each row belongs to
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Abuser identifier per row, aligned with `features`
    pub abuser_ids: Vec<String>,

    /// Feature matrix (n_rows × N_FEATURES)
    pub features: Array2<f64>,

    /// Category values that fell back to the unknown code
    pub unseen_categories: Vec<UnseenCategory>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Value of a named column for one row
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = FEATURE_COLUMNS.iter().position(|c| *c == column)?;
        self.features.get((row, col)).copied()
    }
}

/// Training features plus one label per row
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub matrix: FeatureMatrix,

    /// Target: the abuser's average gap in days
    pub labels: Array1<f64>,
}

/// Most recent incident per abuser, ordered by abuser identifier.
///
/// Ties on the latest date keep the row that appears first in `incidents`.
pub fn latest_incidents(incidents: &[IncidentRecord]) -> Vec<&IncidentRecord> {
    let mut latest: HashMap<&str, &IncidentRecord> = HashMap::new();
    for incident in incidents {
        latest
            .entry(incident.abuser_id.as_str())
            .and_modify(|current| {
                if incident.incident_date > current.incident_date {
                    *current = incident;
                }
            })
            .or_insert(incident);
    }

    let mut rows: Vec<&IncidentRecord> = latest.into_values().collect();
    rows.sort_by(|a, b| a.abuser_id.cmp(&b.abuser_id));
    rows
}

/// Turns incidents into model features against one metrics table and one
/// fitted encoder, for both training and prediction.
pub struct FeatureBuilder<'a> {
    metrics: &'a MetricsTable,
    encoder: &'a CategoryEncoder,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(metrics: &'a MetricsTable, encoder: &'a CategoryEncoder) -> Self {
        Self { metrics, encoder }
    }

    /// One row per incident, labelled with the abuser's average gap
    pub fn training_set(&self, incidents: &[IncidentRecord]) -> Result<TrainingSet> {
        let rows: Vec<&IncidentRecord> = incidents.iter().collect();
        let matrix = self.build(&rows)?;

        let labels = incidents
            .iter()
            .map(|incident| {
                self.metrics
                    .require(&incident.abuser_id)
                    .map(|m| m.avg_days_between_incidents as f64)
            })
            .collect::<Result<Vec<f64>>>()?;

        debug!(rows = matrix.n_rows(), "Training features built");
        Ok(TrainingSet {
            matrix,
            labels: Array1::from_vec(labels),
        })
    }

    /// One row per abuser, built from that abuser's most recent incident
    pub fn prediction_features(&self, incidents: &[IncidentRecord]) -> Result<FeatureMatrix> {
        let rows = latest_incidents(incidents);
        let matrix = self.build(&rows)?;
        debug!(
            rows = matrix.n_rows(),
            unseen = matrix.unseen_categories.len(),
            "Prediction features built"
        );
        Ok(matrix)
    }

    fn build(&self, incidents: &[&IncidentRecord]) -> Result<FeatureMatrix> {
        let mut features = Array2::zeros((incidents.len(), N_FEATURES));
        let mut abuser_ids = Vec::with_capacity(incidents.len());
        let mut unseen = Vec::new();

        for (i, incident) in incidents.iter().enumerate() {
            let row = self.feature_row(incident, &mut unseen)?;
            for (j, value) in row.into_iter().enumerate() {
                features[[i, j]] = value;
            }
            abuser_ids.push(incident.abuser_id.clone());
        }

        Ok(FeatureMatrix {
            abuser_ids,
            features,
            unseen_categories: unseen,
        })
    }

    fn feature_row(
        &self,
        incident: &IncidentRecord,
        unseen: &mut Vec<UnseenCategory>,
    ) -> Result<[f64; N_FEATURES]> {
        let metrics = self.metrics.require(&incident.abuser_id)?;
        let [type_code, relationship_code, region_code] =
            self.encoder.encode_incident(incident, unseen);

        Ok([
            f64::from(metrics.incident_count),
            metrics.avg_days_between_incidents as f64,
            metrics.avg_severity as f64,
            metrics.max_severity as f64,
            metrics.hospitalization_rate as f64,
            metrics.arrest_rate as f64,
            incident.abuser_age_years(),
            type_code as f64,
            relationship_code as f64,
            region_code as f64,
        ])
    }
}

/// Check that the metrics table and the incident table describe the same abusers
pub fn ensure_same_abusers(incidents: &[IncidentRecord], metrics: &MetricsTable) -> Result<()> {
    for incident in incidents {
        metrics.require(&incident.abuser_id)?;
    }

    let incident_abusers: std::collections::HashSet<&str> =
        incidents.iter().map(|i| i.abuser_id.as_str()).collect();
    if let Some(orphan) = metrics.abuser_ids().find(|id| !incident_abusers.contains(id)) {
        return Err(AppError::JoinIntegrity {
            abuser_id: orphan.to_string(),
            detail: "has a metrics row but no incidents".to_string(),
        });
    }

    Ok(())
}
