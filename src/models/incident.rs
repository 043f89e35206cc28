use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lowest severity on the case scale
pub const MIN_SEVERITY: u8 = 1;

/// Highest severity on the case scale
pub const MAX_SEVERITY: u8 = 10;

/// Victim outcome counted towards the hospitalization rate
pub const HOSPITALIZED_OUTCOME: &str = "Hospitalized";

/// Abuser outcome counted towards the arrest rate
pub const ARRESTED_OUTCOME: &str = "Arrested";

/// A single recorded incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct IncidentRecord {
    /// Stable abuser identifier
    #[serde(rename = "Abuser_ID")]
    #[validate(length(min = 1))]
    pub abuser_id: String,

    /// Victim identifier, when the source carries one
    #[serde(rename = "Victim_ID", default)]
    pub victim_id: Option<String>,

    /// Date the incident happened
    #[serde(rename = "Incident_Date")]
    pub incident_date: NaiveDate,

    /// Abuser date of birth
    #[serde(rename = "DOB_of_Abuser")]
    pub abuser_dob: NaiveDate,

    /// Abuser gender (display only)
    #[serde(rename = "Gender_of_Abuser", default)]
    pub abuser_gender: Option<String>,

    /// Incident type (categorical)
    #[serde(rename = "Type_of_Incident")]
    pub incident_type: String,

    /// Relationship of the abuser to the victim (categorical)
    #[serde(rename = "Relationship_to_Victim")]
    pub relationship: String,

    /// Region (categorical)
    #[serde(rename = "Oblast")]
    pub oblast: String,

    /// Severity score
    #[serde(rename = "Severity_of_Case")]
    #[validate(range(min = 1, max = 10))]
    pub severity: u8,

    /// Outcome for the victim, e.g. "Hospitalized"
    #[serde(rename = "Victim_Outcome")]
    pub victim_outcome: String,

    /// Outcome for the abuser, e.g. "Arrested"
    #[serde(rename = "Abuser_Outcome")]
    pub abuser_outcome: String,
}

impl IncidentRecord {
    /// Abuser age in years on the incident date
    pub fn abuser_age_years(&self) -> f64 {
        (self.incident_date - self.abuser_dob).num_days() as f64 / 365.0
    }

    pub fn victim_hospitalized(&self) -> bool {
        self.victim_outcome == HOSPITALIZED_OUTCOME
    }

    pub fn abuser_arrested(&self) -> bool {
        self.abuser_outcome == ARRESTED_OUTCOME
    }
}
