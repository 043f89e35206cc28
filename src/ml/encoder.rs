use crate::metrics::UNSEEN_CATEGORIES_TOTAL;
use crate::models::IncidentRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumIter, IntoStaticStr};
use tracing::warn;

/// Code given to a category value that was not present when the encoder was fitted
pub const UNKNOWN_CATEGORY_CODE: i64 = -1;

/// Categorical incident attributes fed to the model
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum CategoricalField {
    IncidentType,
    Relationship,
    Oblast,
}

impl CategoricalField {
    pub fn value_of<'a>(&self, incident: &'a IncidentRecord) -> &'a str {
        match self {
            CategoricalField::IncidentType => &incident.incident_type,
            CategoricalField::Relationship => &incident.relationship,
            CategoricalField::Oblast => &incident.oblast,
        }
    }
}

/// A category value the encoder had never seen, found while encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnseenCategory {
    pub abuser_id: String,
    pub field: CategoricalField,
    pub value: String,
}

/// Sorted label encoding for one field: code = position in sorted class list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    /// Code for `value`, or `None` if it was not seen during fitting
    pub fn code(&self, value: &str) -> Option<i64> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .map(|idx| idx as i64)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Category-to-code mapping fitted once on the training corpus and reused
/// verbatim for prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    incident_type: LabelEncoder,
    relationship: LabelEncoder,
    oblast: LabelEncoder,
}

impl CategoryEncoder {
    /// Fit on every incident of the training corpus
    pub fn fit(incidents: &[IncidentRecord]) -> Self {
        let fit_field = |field: CategoricalField| {
            LabelEncoder::fit(incidents.iter().map(|i| field.value_of(i)))
        };

        Self {
            incident_type: fit_field(CategoricalField::IncidentType),
            relationship: fit_field(CategoricalField::Relationship),
            oblast: fit_field(CategoricalField::Oblast),
        }
    }

    pub fn field(&self, field: CategoricalField) -> &LabelEncoder {
        match field {
            CategoricalField::IncidentType => &self.incident_type,
            CategoricalField::Relationship => &self.relationship,
            CategoricalField::Oblast => &self.oblast,
        }
    }

    /// Encode one value; unseen values get [`UNKNOWN_CATEGORY_CODE`]
    pub fn encode(&self, field: CategoricalField, value: &str) -> i64 {
        self.field(field).code(value).unwrap_or(UNKNOWN_CATEGORY_CODE)
    }

    /// Encode the three categorical attributes of an incident.
    ///
    /// Unseen values are logged, counted and appended to `unseen`.
    pub fn encode_incident(
        &self,
        incident: &IncidentRecord,
        unseen: &mut Vec<UnseenCategory>,
    ) -> [i64; 3] {
        let mut codes = [UNKNOWN_CATEGORY_CODE; 3];
        let fields = [
            CategoricalField::IncidentType,
            CategoricalField::Relationship,
            CategoricalField::Oblast,
        ];

        for (slot, field) in codes.iter_mut().zip(fields) {
            let value = field.value_of(incident);
            *slot = match self.field(field).code(value) {
                Some(code) => code,
                None => {
                    warn!(
                        abuser_id = %incident.abuser_id,
                        field = %field,
                        value = value,
                        "Category value unseen during training, using unknown code"
                    );
                    let label: &'static str = field.into();
                    UNSEEN_CATEGORIES_TOTAL.with_label_values(&[label]).inc();
                    unseen.push(UnseenCategory {
                        abuser_id: incident.abuser_id.clone(),
                        field,
                        value: value.to_string(),
                    });
                    UNKNOWN_CATEGORY_CODE
                }
            };
        }

        codes
    }
}
