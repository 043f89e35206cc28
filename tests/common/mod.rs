//! Shared fixtures for the integration tests

#![allow(dead_code)]

use abuser_recurrence_forecast::models::IncidentRecord;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::path::Path;

pub const INCIDENT_HEADER: &str = "Abuser_ID,Victim_ID,Incident_Date,DOB_of_Abuser,Gender_of_Abuser,Type_of_Incident,Relationship_to_Victim,Oblast,Severity_of_Case,Victim_Outcome,Abuser_Outcome";

const INCIDENT_TYPES: [&str; 4] = ["Economic", "Physical", "Psychological", "Sexual"];
const RELATIONSHIPS: [&str; 3] = ["Ex-partner", "Partner", "Spouse"];
const OBLASTS: [&str; 4] = ["Kharkiv", "Kyiv", "Lviv", "Odesa"];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Builder for one incident row with sensible defaults
#[derive(Debug, Clone)]
pub struct IncidentBuilder {
    record: IncidentRecord,
}

impl IncidentBuilder {
    pub fn new(abuser_id: &str, incident_date: NaiveDate) -> Self {
        Self {
            record: IncidentRecord {
                abuser_id: abuser_id.to_string(),
                victim_id: Some(format!("V-{}", abuser_id)),
                incident_date,
                abuser_dob: date(1984, 7, 12),
                abuser_gender: Some("Male".to_string()),
                incident_type: "Physical".to_string(),
                relationship: "Spouse".to_string(),
                oblast: "Kyiv".to_string(),
                severity: 5,
                victim_outcome: "None".to_string(),
                abuser_outcome: "None".to_string(),
            },
        }
    }

    pub fn severity(mut self, severity: u8) -> Self {
        self.record.severity = severity;
        self
    }

    pub fn oblast(mut self, oblast: &str) -> Self {
        self.record.oblast = oblast.to_string();
        self
    }

    pub fn incident_type(mut self, incident_type: &str) -> Self {
        self.record.incident_type = incident_type.to_string();
        self
    }

    pub fn relationship(mut self, relationship: &str) -> Self {
        self.record.relationship = relationship.to_string();
        self
    }

    pub fn hospitalized(mut self) -> Self {
        self.record.victim_outcome = "Hospitalized".to_string();
        self
    }

    pub fn arrested(mut self) -> Self {
        self.record.abuser_outcome = "Arrested".to_string();
        self
    }

    pub fn build(self) -> IncidentRecord {
        self.record
    }
}

/// A1: three incidents 45 days apart, severities 5/7/9
pub fn scenario_a1() -> Vec<IncidentRecord> {
    vec![
        IncidentBuilder::new("A1", date(2023, 1, 1))
            .severity(5)
            .hospitalized()
            .arrested()
            .build(),
        IncidentBuilder::new("A1", date(2023, 2, 15))
            .severity(7)
            .arrested()
            .build(),
        IncidentBuilder::new("A1", date(2023, 4, 1))
            .severity(9)
            .hospitalized()
            .build(),
    ]
}

/// Deterministic corpus of `abusers` abusers with 1 to 4 incidents each
pub fn synthetic_corpus(abusers: usize) -> Vec<IncidentRecord> {
    let start = date(2022, 1, 1);
    let mut incidents = Vec::new();

    for a in 0..abusers {
        let id = format!("AB{:04}", a);
        let count = a % 4 + 1;
        let gap = 20 + (a * 37) % 160;
        for n in 0..count {
            let mut builder = IncidentBuilder::new(&id, start + Duration::days((a * 3 + n * gap) as i64))
                .severity(((a + n * 3) % 10 + 1) as u8)
                .incident_type(INCIDENT_TYPES[(a + n) % INCIDENT_TYPES.len()])
                .relationship(RELATIONSHIPS[a % RELATIONSHIPS.len()])
                .oblast(OBLASTS[(a / 2) % OBLASTS.len()]);
            if (a + n) % 3 == 0 {
                builder = builder.hospitalized();
            }
            if (a * n) % 2 == 1 {
                builder = builder.arrested();
            }
            let mut record = builder.build();
            record.abuser_dob = date(1960 + (a % 30) as i32, 1 + (a % 12) as u32, 1);
            incidents.push(record);
        }
    }

    incidents
}

/// Render incidents as an incident table
pub fn incidents_csv(incidents: &[IncidentRecord]) -> String {
    let mut out = String::from(INCIDENT_HEADER);
    out.push('\n');
    for i in incidents {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            i.abuser_id,
            i.victim_id.clone().unwrap_or_default(),
            i.incident_date.format("%Y-%m-%d"),
            i.abuser_dob.format("%Y-%m-%d"),
            i.abuser_gender.clone().unwrap_or_default(),
            i.incident_type,
            i.relationship,
            i.oblast,
            i.severity,
            i.victim_outcome,
            i.abuser_outcome,
        ));
    }
    out
}

pub fn write_incidents(path: &Path, incidents: &[IncidentRecord]) {
    std::fs::write(path, incidents_csv(incidents)).unwrap();
}

/// Parse Prometheus exposition text into metric name -> sample lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics: HashMap<String, Vec<String>> = HashMap::new();
    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let name_end = line
            .find(|c: char| c == '{' || c.is_whitespace())
            .unwrap_or(line.len());
        metrics
            .entry(line[..name_end].to_string())
            .or_default()
            .push(line.to_string());
    }
    metrics
}

/// Last whitespace-separated field of a sample line, as a number
pub fn extract_metric_value(line: &str) -> Option<f64> {
    line.split_whitespace().last()?.parse::<f64>().ok()
}
