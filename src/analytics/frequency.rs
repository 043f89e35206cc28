//! Incident frequency per abuser

use crate::models::IncidentRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Gap assigned to abusers with a single incident, where no gap exists
pub const SINGLE_INCIDENT_GAP_DAYS: f64 = 365.0;

/// Frequency statistics for one abuser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyStats {
    pub incident_count: u32,
    /// Mean of consecutive day differences, unrounded
    pub avg_days_between_incidents: f64,
}

/// Mean gap in days between consecutive dates once sorted.
///
/// Returns `None` when fewer than two dates exist.
pub fn mean_gap_days(dates: &[NaiveDate]) -> Option<f64> {
    if dates.len() < 2 {
        return None;
    }

    let mut sorted = dates.to_vec();
    sorted.sort_unstable();

    let total: i64 = sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .sum();

    Some(total as f64 / (sorted.len() - 1) as f64)
}

/// Count incidents and average the inter-incident gap for every abuser.
///
/// Covers exactly the abusers present in `incidents`.
pub fn calculate_incident_frequency(
    incidents: &[IncidentRecord],
) -> BTreeMap<String, FrequencyStats> {
    let mut dates_by_abuser: BTreeMap<&str, Vec<NaiveDate>> = BTreeMap::new();
    for incident in incidents {
        dates_by_abuser
            .entry(incident.abuser_id.as_str())
            .or_default()
            .push(incident.incident_date);
    }

    dates_by_abuser
        .into_iter()
        .map(|(abuser_id, dates)| {
            let stats = FrequencyStats {
                incident_count: dates.len() as u32,
                avg_days_between_incidents: mean_gap_days(&dates)
                    .unwrap_or(SINGLE_INCIDENT_GAP_DAYS),
            };
            (abuser_id.to_string(), stats)
        })
        .collect()
}
