//! Merge frequency and risk statistics into the metrics table

use crate::analytics::frequency::{calculate_incident_frequency, FrequencyStats};
use crate::analytics::risk::{calculate_abuser_risk_metrics, RiskStats};
use crate::error::{AppError, Result};
use crate::metrics::{StageTimer, ABUSERS_PROFILED};
use crate::models::{IncidentRecord, MetricsTable, OffenderMetrics};
use std::collections::BTreeMap;
use tracing::info;

/// Round half to even, matching how the published tables have always been rounded
pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Join the two aggregations on abuser identifier and round for output.
///
/// Both sides must cover the same abusers; a one-sided abuser is a join
/// integrity error.
pub fn combine_metrics(
    frequency: &BTreeMap<String, FrequencyStats>,
    risk: &BTreeMap<String, RiskStats>,
) -> Result<MetricsTable> {
    if let Some(abuser_id) = risk.keys().find(|id| !frequency.contains_key(*id)) {
        return Err(AppError::JoinIntegrity {
            abuser_id: abuser_id.clone(),
            detail: "has risk statistics but no frequency statistics".to_string(),
        });
    }

    let mut rows = Vec::with_capacity(frequency.len());
    for (abuser_id, freq) in frequency {
        let risk = risk.get(abuser_id).ok_or_else(|| AppError::JoinIntegrity {
            abuser_id: abuser_id.clone(),
            detail: "has frequency statistics but no risk statistics".to_string(),
        })?;

        rows.push(OffenderMetrics {
            abuser_id: abuser_id.clone(),
            incident_count: freq.incident_count,
            avg_days_between_incidents: round_half_even(freq.avg_days_between_incidents),
            avg_severity: round_half_even(risk.avg_severity),
            max_severity: i64::from(risk.max_severity),
            hospitalization_rate: round_half_even(risk.hospitalization_rate),
            arrest_rate: round_half_even(risk.arrest_rate),
        });
    }

    MetricsTable::from_rows(rows)
}

/// Build the metrics table straight from the incident table
pub fn calculate_offender_metrics(incidents: &[IncidentRecord]) -> Result<MetricsTable> {
    let _timer = StageTimer::start("metrics");

    let frequency = calculate_incident_frequency(incidents);
    let risk = calculate_abuser_risk_metrics(incidents);
    let table = combine_metrics(&frequency, &risk)?;

    ABUSERS_PROFILED.set(table.len() as f64);
    info!(
        incidents = incidents.len(),
        abusers = table.len(),
        "Offender metrics calculated"
    );
    Ok(table)
}
