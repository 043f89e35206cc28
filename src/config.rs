use crate::error::{AppError, Result};
use crate::ml::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "RECURRENCE_CONFIG";

/// Prefix for environment overrides, e.g. `RECURRENCE__MODEL__SEED=7`
pub const ENV_PREFIX: &str = "RECURRENCE";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Forecast model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment, in increasing priority.
    ///
    /// The file is `path` when given, else the file named by
    /// `RECURRENCE_CONFIG` if that variable is set.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            include_str!("../config/default.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(file) = file {
            builder = builder.add_source(
                config::File::from(file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        if model.n_estimators == 0 {
            return Err(AppError::Configuration(
                "model.n_estimators must be at least 1".to_string(),
            ));
        }
        if !(model.test_size > 0.0 && model.test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "model.test_size must be between 0 and 1 (exclusive), got {}",
                model.test_size
            )));
        }
        if model.max_depth == Some(0) {
            return Err(AppError::Configuration(
                "model.max_depth must be at least 1 when set".to_string(),
            ));
        }
        if self.paths.metrics_output == self.paths.forecast_output {
            return Err(AppError::Configuration(
                "metrics and forecast outputs must be different files".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Incident table (CSV)
    #[serde(default = "default_incidents")]
    pub incidents: PathBuf,

    /// Metrics table written by the metrics stage
    #[serde(default = "default_metrics_output")]
    pub metrics_output: PathBuf,

    /// Forecast table written by the forecast stage
    #[serde(default = "default_forecast_output")]
    pub forecast_output: PathBuf,

    /// Prometheus text export written after a run
    #[serde(default)]
    pub metrics_export: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            incidents: default_incidents(),
            metrics_output: default_metrics_output(),
            forecast_output: default_forecast_output(),
            metrics_export: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level, or any `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Register pipeline metrics with the Prometheus registry
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

fn default_incidents() -> PathBuf {
    PathBuf::from("incident_data.csv")
}

fn default_metrics_output() -> PathBuf {
    PathBuf::from("frequency_analysis.csv")
}

fn default_forecast_output() -> PathBuf {
    PathBuf::from("incident_predictions.csv")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
