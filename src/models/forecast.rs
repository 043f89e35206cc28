use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Predicted next incident for one abuser (one row of the forecast table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastResult {
    #[serde(rename = "Abuser_ID")]
    pub abuser_id: String,

    /// Latest known incident date plus `days_until_next`, written as YYYY-MM-DD
    pub next_incident_date: NaiveDate,

    /// Rounded model output
    pub days_until_next: i64,
}

impl ForecastResult {
    /// Derive the forecast row from the latest incident and the rounded gap
    pub fn derive(abuser_id: impl Into<String>, latest_incident: NaiveDate, days_until_next: i64) -> Self {
        Self {
            abuser_id: abuser_id.into(),
            next_incident_date: latest_incident + Duration::days(days_until_next),
            days_until_next,
        }
    }
}
