//! Machine learning for incident recurrence
//!
//! - Category encoding fitted once on the training corpus
//! - Feature rows for training (per incident) and prediction (per abuser)
//! - Random forest regression of days until the next incident
//! - Conversion of predicted gaps into next-incident dates

pub mod encoder;
pub mod features;
pub mod forecaster;
pub mod models;
pub mod regressor;

pub use encoder::{
    CategoricalField, CategoryEncoder, LabelEncoder, UnseenCategory, UNKNOWN_CATEGORY_CODE,
};
pub use features::{
    ensure_same_abusers, latest_incidents, FeatureBuilder, FeatureMatrix, TrainingSet,
    FEATURE_COLUMNS, N_FEATURES,
};
pub use forecaster::{ForecastOutput, IncidentForecaster};
pub use models::{ModelConfig, ModelMetadata, ModelType, RegressionMetrics};
pub use regressor::{ForecastModel, Regressor};
