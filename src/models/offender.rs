use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-abuser recurrence and risk metrics (one row of the metrics table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenderMetrics {
    #[serde(rename = "Abuser_ID")]
    pub abuser_id: String,

    /// Number of incidents recorded for this abuser (>= 1)
    pub incident_count: u32,

    /// Rounded mean gap between consecutive incidents, in days
    pub avg_days_between_incidents: i64,

    /// Rounded mean severity
    pub avg_severity: i64,

    /// Highest severity observed
    pub max_severity: i64,

    /// Percentage of incidents where the victim was hospitalized (0-100)
    pub hospitalization_rate: i64,

    /// Percentage of incidents where the abuser was arrested (0-100)
    pub arrest_rate: i64,
}

impl OffenderMetrics {
    /// Check the row-level invariants of a metrics row
    pub fn validate(&self, row: usize) -> Result<()> {
        if self.abuser_id.is_empty() {
            return Err(AppError::InvalidField {
                row,
                column: "Abuser_ID".to_string(),
                message: "empty abuser identifier".to_string(),
            });
        }
        if self.incident_count == 0 {
            return Err(AppError::InvalidField {
                row,
                column: "incident_count".to_string(),
                message: "incident_count must be at least 1".to_string(),
            });
        }
        if self.avg_days_between_incidents < 0 {
            return Err(AppError::InvalidField {
                row,
                column: "avg_days_between_incidents".to_string(),
                message: format!("negative gap {}", self.avg_days_between_incidents),
            });
        }
        for (column, rate) in [
            ("hospitalization_rate", self.hospitalization_rate),
            ("arrest_rate", self.arrest_rate),
        ] {
            if !(0..=100).contains(&rate) {
                return Err(AppError::InvalidField {
                    row,
                    column: column.to_string(),
                    message: format!("rate {} outside [0, 100]", rate),
                });
            }
        }
        Ok(())
    }
}

/// The metrics table: exactly one row per abuser, ordered by abuser identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsTable {
    rows: BTreeMap<String, OffenderMetrics>,
}

impl MetricsTable {
    /// Build a table, rejecting duplicate abuser identifiers
    pub fn from_rows(rows: Vec<OffenderMetrics>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for (idx, row) in rows.into_iter().enumerate() {
            row.validate(idx + 1)?;
            if table.contains_key(&row.abuser_id) {
                return Err(AppError::InvalidRecord {
                    row: idx + 1,
                    message: format!("duplicate metrics row for abuser '{}'", row.abuser_id),
                });
            }
            table.insert(row.abuser_id.clone(), row);
        }
        Ok(Self { rows: table })
    }

    pub fn get(&self, abuser_id: &str) -> Option<&OffenderMetrics> {
        self.rows.get(abuser_id)
    }

    /// Look up an abuser that must be present
    pub fn require(&self, abuser_id: &str) -> Result<&OffenderMetrics> {
        self.get(abuser_id).ok_or_else(|| AppError::JoinIntegrity {
            abuser_id: abuser_id.to_string(),
            detail: "has incidents but no row in the metrics table".to_string(),
        })
    }

    pub fn contains(&self, abuser_id: &str) -> bool {
        self.rows.contains_key(abuser_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OffenderMetrics> {
        self.rows.values()
    }

    pub fn abuser_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }
}
