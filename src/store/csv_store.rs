use crate::error::{AppError, Result};
use crate::models::{ForecastResult, IncidentRecord, MetricsTable, OffenderMetrics};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io::Read;
use tracing::debug;
use validator::Validate;

/// Columns every incident table must carry
pub const REQUIRED_INCIDENT_COLUMNS: [&str; 9] = [
    "Abuser_ID",
    "Incident_Date",
    "DOB_of_Abuser",
    "Type_of_Incident",
    "Relationship_to_Victim",
    "Oblast",
    "Severity_of_Case",
    "Victim_Outcome",
    "Abuser_Outcome",
];

/// Columns every metrics table must carry
pub const REQUIRED_METRICS_COLUMNS: [&str; 7] = [
    "Abuser_ID",
    "incident_count",
    "avg_days_between_incidents",
    "avg_severity",
    "max_severity",
    "hospitalization_rate",
    "arrest_rate",
];

/// Columns every forecast table must carry
pub const REQUIRED_FORECAST_COLUMNS: [&str; 3] =
    ["Abuser_ID", "next_incident_date", "days_until_next"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Incident row as it appears in the file, before type checks
#[derive(Debug, Deserialize)]
struct RawIncidentRow {
    #[serde(rename = "Abuser_ID")]
    abuser_id: String,
    #[serde(rename = "Victim_ID", default)]
    victim_id: Option<String>,
    #[serde(rename = "Incident_Date")]
    incident_date: String,
    #[serde(rename = "DOB_of_Abuser")]
    abuser_dob: String,
    #[serde(rename = "Gender_of_Abuser", default)]
    abuser_gender: Option<String>,
    #[serde(rename = "Type_of_Incident")]
    incident_type: String,
    #[serde(rename = "Relationship_to_Victim")]
    relationship: String,
    #[serde(rename = "Oblast")]
    oblast: String,
    #[serde(rename = "Severity_of_Case")]
    severity: String,
    #[serde(rename = "Victim_Outcome")]
    victim_outcome: String,
    #[serde(rename = "Abuser_Outcome")]
    abuser_outcome: String,
}

/// Parse a calendar date in any of the accepted layouts
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn parse_date_field(row: usize, column: &str, value: &str) -> Result<NaiveDate> {
    parse_date(value).ok_or_else(|| AppError::InvalidField {
        row,
        column: column.to_string(),
        message: format!("unparseable date '{}'", value),
    })
}

/// Severity must be a whole number; "7" and "7.0" are both accepted
fn parse_severity(row: usize, value: &str) -> Result<u8> {
    let invalid = |message: String| AppError::InvalidField {
        row,
        column: "Severity_of_Case".to_string(),
        message,
    };

    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("unparseable severity '{}'", value)))?;

    if !parsed.is_finite() || parsed.fract() != 0.0 || !(0.0..=255.0).contains(&parsed) {
        return Err(invalid(format!("severity '{}' is not a whole score", value)));
    }

    Ok(parsed as u8)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn check_headers(headers: &csv::StringRecord, required: &[&str]) -> Result<()> {
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(AppError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

/// Read and validate an incident table.
///
/// Row numbers in diagnostics are 1-based data rows (the header is not counted).
pub fn read_incidents<R: Read>(reader: R) -> Result<Vec<IncidentRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    check_headers(csv_reader.headers()?, &REQUIRED_INCIDENT_COLUMNS)?;

    let mut incidents = Vec::new();
    for (idx, result) in csv_reader.deserialize::<RawIncidentRow>().enumerate() {
        let row = idx + 1;
        let raw = result.map_err(|e| AppError::InvalidRecord {
            row,
            message: e.to_string(),
        })?;

        let incident = IncidentRecord {
            abuser_id: raw.abuser_id,
            victim_id: non_empty(raw.victim_id),
            incident_date: parse_date_field(row, "Incident_Date", &raw.incident_date)?,
            abuser_dob: parse_date_field(row, "DOB_of_Abuser", &raw.abuser_dob)?,
            abuser_gender: non_empty(raw.abuser_gender),
            incident_type: raw.incident_type,
            relationship: raw.relationship,
            oblast: raw.oblast,
            severity: parse_severity(row, &raw.severity)?,
            victim_outcome: raw.victim_outcome,
            abuser_outcome: raw.abuser_outcome,
        };

        incident.validate().map_err(|e| AppError::InvalidRecord {
            row,
            message: e.to_string(),
        })?;

        incidents.push(incident);
    }

    debug!(rows = incidents.len(), "Incident table parsed");
    Ok(incidents)
}

/// Read and validate a previously persisted metrics table
pub fn read_metrics_table<R: Read>(reader: R) -> Result<MetricsTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    check_headers(csv_reader.headers()?, &REQUIRED_METRICS_COLUMNS)?;

    let mut rows = Vec::new();
    for (idx, result) in csv_reader.deserialize::<OffenderMetrics>().enumerate() {
        let row = result.map_err(|e| AppError::InvalidRecord {
            row: idx + 1,
            message: e.to_string(),
        })?;
        rows.push(row);
    }

    MetricsTable::from_rows(rows)
}

/// Read a previously persisted forecast table
pub fn read_forecasts<R: Read>(reader: R) -> Result<Vec<ForecastResult>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    check_headers(csv_reader.headers()?, &REQUIRED_FORECAST_COLUMNS)?;

    csv_reader
        .deserialize::<ForecastResult>()
        .enumerate()
        .map(|(idx, result)| {
            result.map_err(|e| AppError::InvalidRecord {
                row: idx + 1,
                message: e.to_string(),
            })
        })
        .collect()
}
