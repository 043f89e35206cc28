use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Required column absent from an input table
    #[error("Schema error: missing required column '{0}'")]
    MissingColumn(String),

    /// A field could not be parsed or is outside its allowed range
    #[error("Schema error: row {row}, column '{column}': {message}")]
    InvalidField {
        row: usize,
        column: String,
        message: String,
    },

    /// A record failed validation as a whole
    #[error("Schema error: row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Not enough rows to run a stage
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A merge expected to be total left an abuser on one side only
    #[error("Join integrity error: abuser '{abuser_id}' {detail}")]
    JoinIntegrity { abuser_id: String, detail: String },

    /// Model output does not line up with the abusers being forecast
    #[error("Prediction count mismatch: {predictions} predictions for {abusers} abusers")]
    PredictionCountMismatch { predictions: usize, abusers: usize },

    /// Model produced a negative gap
    #[error("Negative prediction for abuser '{abuser_id}': {days} days")]
    NegativePrediction { abuser_id: String, days: f64 },

    /// Training or inference failure inside the estimator
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::MissingColumn(_)
            | AppError::InvalidField { .. }
            | AppError::InvalidRecord { .. } => "SCHEMA_ERROR",
            AppError::InsufficientData(_) => "INSUFFICIENT_DATA",
            AppError::JoinIntegrity { .. } => "JOIN_INTEGRITY_ERROR",
            AppError::PredictionCountMismatch { .. } => "PREDICTION_COUNT_MISMATCH",
            AppError::NegativePrediction { .. } => "NEGATIVE_PREDICTION",
            AppError::Model(_) => "MODEL_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the error comes from malformed input rather than a pipeline fault
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingColumn(_)
                | AppError::InvalidField { .. }
                | AppError::InvalidRecord { .. }
        )
    }
}

/// Conversion from csv::Error
impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Csv(err.to_string())
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from tempfile::PersistError (failed rename of a staged artifact)
impl From<tempfile::PersistError> for AppError {
    fn from(err: tempfile::PersistError) -> Self {
        AppError::Io(err.error)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
