//! High-risk report over the incident, metrics and forecast tables

use crate::analytics::statistics::{mean, Distribution};
use crate::error::Result;
use crate::models::{ForecastResult, IncidentRecord, MetricsTable};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use strum::{Display, EnumString};

/// Default minimum severity for a case to count as high risk
pub const DEFAULT_MIN_SEVERITY: u8 = 6;

/// Which rows the report looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    /// Restrict to one oblast; `None` means all regions
    pub oblast: Option<String>,
    /// Incidents at or above this severity are high risk
    pub min_severity: u8,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            oblast: None,
            min_severity: DEFAULT_MIN_SEVERITY,
        }
    }
}

/// Output format for a rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ReportFormat {
    Markdown,
    Json,
}

/// One abuser in the high-risk table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighRiskAbuser {
    pub abuser_id: String,
    pub gender: Option<String>,
    pub date_of_birth: NaiveDate,
    pub predicted_next_incident: Option<NaiveDate>,
    pub average_severity: f64,
}

/// Severity spread within one oblast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OblastSeverity {
    pub oblast: String,
    pub severity: Distribution,
}

/// The assembled report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub region: String,
    pub min_severity: u8,
    pub high_risk_abuser_count: usize,
    pub average_severity: Option<f64>,
    pub average_hospitalization_rate: Option<f64>,
    pub high_risk_abusers: Vec<HighRiskAbuser>,
    pub severity_by_oblast: Vec<OblastSeverity>,
}

/// Build the high-risk view.
///
/// Metrics and forecasts are joined per incident row; abusers missing from
/// either table simply contribute no value for that column.
pub fn build_risk_report(
    incidents: &[IncidentRecord],
    metrics: &MetricsTable,
    forecasts: &[ForecastResult],
    filter: &ReportFilter,
) -> Result<RiskReport> {
    let next_dates: HashMap<&str, NaiveDate> = forecasts
        .iter()
        .map(|f| (f.abuser_id.as_str(), f.next_incident_date))
        .collect();

    let in_region: Vec<&IncidentRecord> = incidents
        .iter()
        .filter(|i| filter.oblast.as_ref().map_or(true, |o| &i.oblast == o))
        .collect();

    let high_risk: Vec<&IncidentRecord> = in_region
        .iter()
        .copied()
        .filter(|i| i.severity >= filter.min_severity)
        .collect();

    let severities: Vec<f64> = high_risk.iter().map(|i| f64::from(i.severity)).collect();
    let hospitalization_rates: Vec<f64> = high_risk
        .iter()
        .filter_map(|i| metrics.get(&i.abuser_id))
        .map(|m| m.hospitalization_rate as f64)
        .collect();

    // First row per abuser supplies gender and date of birth
    let mut grouped: BTreeMap<&str, (&IncidentRecord, Vec<f64>)> = BTreeMap::new();
    for incident in &high_risk {
        grouped
            .entry(incident.abuser_id.as_str())
            .or_insert_with(|| (*incident, Vec::new()))
            .1
            .push(f64::from(incident.severity));
    }

    let mut high_risk_abusers: Vec<HighRiskAbuser> = grouped
        .into_iter()
        .map(|(abuser_id, (first, severities))| HighRiskAbuser {
            abuser_id: abuser_id.to_string(),
            gender: first.abuser_gender.clone(),
            date_of_birth: first.abuser_dob,
            predicted_next_incident: next_dates.get(abuser_id).copied(),
            average_severity: mean(&severities).unwrap_or_default(),
        })
        .collect();
    high_risk_abusers.sort_by(|a, b| {
        b.average_severity
            .total_cmp(&a.average_severity)
            .then_with(|| a.abuser_id.cmp(&b.abuser_id))
    });

    let mut by_oblast: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for incident in &in_region {
        by_oblast
            .entry(incident.oblast.as_str())
            .or_default()
            .push(f64::from(incident.severity));
    }
    let severity_by_oblast = by_oblast
        .into_iter()
        .map(|(oblast, values)| {
            Ok(OblastSeverity {
                oblast: oblast.to_string(),
                severity: Distribution::from_data(&values)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RiskReport {
        region: filter.oblast.clone().unwrap_or_else(|| "All".to_string()),
        min_severity: filter.min_severity,
        high_risk_abuser_count: high_risk_abusers.len(),
        average_severity: mean(&severities),
        average_hospitalization_rate: mean(&hospitalization_rates),
        high_risk_abusers,
        severity_by_oblast,
    })
}

fn fmt_optional(value: Option<f64>, suffix: &str) -> String {
    value
        .map(|v| format!("{:.1}{}", v, suffix))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Render the report as Markdown
pub fn render_markdown(report: &RiskReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# High-Risk Cases - {}", report.region);
    let _ = writeln!(output, "Minimum severity score: {}", report.min_severity);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Total high-risk cases: {}", report.high_risk_abuser_count);
    let _ = writeln!(
        output,
        "- Average severity: {}",
        fmt_optional(report.average_severity, "")
    );
    let _ = writeln!(
        output,
        "- Hospitalization rate: {}",
        fmt_optional(report.average_hospitalization_rate, "%")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## High-Risk Abusers");
    if report.high_risk_abusers.is_empty() {
        let _ = writeln!(output, "No cases at or above this severity.");
    } else {
        let _ = writeln!(
            output,
            "| ID | Gender | Date of Birth | Predicted Next Incident | Average Severity |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|");
        for abuser in &report.high_risk_abusers {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {:.1} |",
                abuser.abuser_id,
                abuser.gender.as_deref().unwrap_or("-"),
                abuser.date_of_birth,
                abuser
                    .predicted_next_incident
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                abuser.average_severity
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Severity Distribution by Oblast");
    if report.severity_by_oblast.is_empty() {
        let _ = writeln!(output, "No incidents recorded for this region.");
    } else {
        let _ = writeln!(output, "| Oblast | Cases | Min | Q1 | Median | Q3 | Max | Mean |");
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for entry in &report.severity_by_oblast {
            let d = &entry.severity;
            let _ = writeln!(
                output,
                "| {} | {} | {:.0} | {:.1} | {:.1} | {:.1} | {:.0} | {:.1} |",
                entry.oblast, d.count, d.min, d.q1, d.median, d.q3, d.max, d.mean
            );
        }
    }

    output
}

/// Render the report in the requested format
pub fn render(report: &RiskReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Markdown => Ok(render_markdown(report)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}
