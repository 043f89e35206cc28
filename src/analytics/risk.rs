//! Severity and outcome statistics per abuser

use crate::models::IncidentRecord;
use std::collections::BTreeMap;

/// Risk statistics for one abuser, before rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskStats {
    pub avg_severity: f64,
    pub max_severity: u8,
    /// Percentage of incidents with a hospitalized victim (0.0 - 100.0)
    pub hospitalization_rate: f64,
    /// Percentage of incidents with an arrested abuser (0.0 - 100.0)
    pub arrest_rate: f64,
}

#[derive(Default)]
struct RiskAccumulator {
    count: u32,
    severity_sum: u32,
    max_severity: u8,
    hospitalized: u32,
    arrested: u32,
}

impl RiskAccumulator {
    fn add(&mut self, incident: &IncidentRecord) {
        self.count += 1;
        self.severity_sum += u32::from(incident.severity);
        self.max_severity = self.max_severity.max(incident.severity);
        if incident.victim_hospitalized() {
            self.hospitalized += 1;
        }
        if incident.abuser_arrested() {
            self.arrested += 1;
        }
    }

    fn finish(&self) -> RiskStats {
        let count = f64::from(self.count);
        RiskStats {
            avg_severity: f64::from(self.severity_sum) / count,
            max_severity: self.max_severity,
            hospitalization_rate: f64::from(self.hospitalized) / count * 100.0,
            arrest_rate: f64::from(self.arrested) / count * 100.0,
        }
    }
}

/// Severity mean/max and outcome rates for every abuser in `incidents`
pub fn calculate_abuser_risk_metrics(incidents: &[IncidentRecord]) -> BTreeMap<String, RiskStats> {
    let mut accumulators: BTreeMap<&str, RiskAccumulator> = BTreeMap::new();
    for incident in incidents {
        accumulators
            .entry(incident.abuser_id.as_str())
            .or_default()
            .add(incident);
    }

    accumulators
        .into_iter()
        .map(|(abuser_id, acc)| (abuser_id.to_string(), acc.finish()))
        .collect()
}
