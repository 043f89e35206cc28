//! Model configuration, metadata and held-out scores

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Forecast model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of trees in the forest
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Seed shared by the train/test split and the forest
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fraction of rows held out for evaluation (0.0 - 1.0, exclusive)
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Maximum tree depth; unlimited when absent
    #[serde(default)]
    pub max_depth: Option<u16>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            seed: default_seed(),
            test_size: default_test_size(),
            max_depth: None,
        }
    }
}

impl ModelConfig {
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("n_estimators".to_string(), self.n_estimators.to_string());
        params.insert("seed".to_string(), self.seed.to_string());
        params.insert("test_size".to_string(), self.test_size.to_string());
        params.insert(
            "max_depth".to_string(),
            self.max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        params
    }
}

fn default_n_estimators() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bagged regression trees
    RandomForest,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
        }
    }
}

/// Regression error measures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean absolute error (days)
    pub mae: f64,

    /// Root mean squared error (days)
    pub rmse: f64,

    /// Coefficient of determination
    pub r_squared: f64,

    /// Rows evaluated
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compare predictions with the true labels, row by row
    pub fn from_predictions(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n_samples = y_true.len().min(y_pred.len());
        if n_samples == 0 {
            return Self {
                mae: 0.0,
                rmse: 0.0,
                r_squared: 0.0,
                n_samples: 0,
            };
        }

        let n = n_samples as f64;
        let pairs = || y_true.iter().zip(y_pred.iter());

        let mae = pairs().map(|(t, p)| (t - p).abs()).sum::<f64>() / n;
        let ss_res = pairs().map(|(t, p)| (t - p).powi(2)).sum::<f64>();
        let rmse = (ss_res / n).sqrt();

        let mean_true = y_true[..n_samples].iter().sum::<f64>() / n;
        let ss_tot = y_true[..n_samples]
            .iter()
            .map(|t| (t - mean_true).powi(2))
            .sum::<f64>();

        // Constant labels: perfect fit scores 1, anything else 0
        let r_squared = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            mae,
            rmse,
            r_squared,
            n_samples,
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of rows the estimator was fitted on
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Held-out evaluation; absent when the corpus was too small to split
    pub validation_metrics: Option<RegressionMetrics>,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
}
