//! Days-until-next-incident regression
//!
//! [`ForecastModel`] wraps a smartcore random forest. Every split considers
//! all feature columns, and the seed drives both the train/test split and
//! the forest.

use crate::error::{AppError, Result};
use crate::metrics::HELD_OUT_MAE_DAYS;
use crate::ml::encoder::CategoryEncoder;
use crate::ml::features::{TrainingSet, N_FEATURES};
use crate::ml::models::{ModelConfig, ModelMetadata, ModelType, RegressionMetrics};
use ndarray::Array2;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::arrays::Array as _;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::model_selection::train_test_split;
use tracing::{info, warn};

/// Trait for days-until-next-incident estimators
pub trait Regressor: Send + Sync {
    /// Predict one value per feature row
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>>;

    /// Encoder the model was trained with
    fn encoder(&self) -> &CategoryEncoder;

    /// Score predictions for `features` against the true `labels`
    fn evaluate(&self, features: &Array2<f64>, labels: &[f64]) -> Result<RegressionMetrics> {
        let predictions = self.predict(features)?;
        if predictions.len() != labels.len() {
            return Err(AppError::Model(format!(
                "{} predictions for {} labels",
                predictions.len(),
                labels.len()
            )));
        }
        Ok(RegressionMetrics::from_predictions(labels, &predictions))
    }
}

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest regressor trained on incident-level rows
pub struct ForecastModel {
    metadata: ModelMetadata,
    encoder: CategoryEncoder,
    forest: Forest,
}

impl ForecastModel {
    /// Split, fit and evaluate a forest on `training`.
    ///
    /// When the corpus is too small to hold out at least one row on each
    /// side, the forest is fitted on every row and no evaluation is recorded.
    pub fn train(
        training: &TrainingSet,
        encoder: CategoryEncoder,
        config: &ModelConfig,
    ) -> Result<Self> {
        let n_rows = training.matrix.n_rows();
        if n_rows == 0 {
            return Err(AppError::InsufficientData(
                "no training rows to fit the forecast model".to_string(),
            ));
        }
        if !(config.test_size > 0.0 && config.test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "test_size must be between 0 and 1 (exclusive), got {}",
                config.test_size
            )));
        }

        let x = ndarray_to_densematrix(&training.matrix.features);
        let y = training.labels.to_vec();

        let n_test = (n_rows as f32 * config.test_size as f32) as usize;
        if n_test == 0 || n_test >= n_rows {
            warn!(
                rows = n_rows,
                test_size = config.test_size,
                "Too few rows to hold out a test set, fitting on all rows"
            );
            let model = Self::from_forest(fit_forest(&x, &y, config)?, encoder, n_rows, config);
            info!(rows = n_rows, "Forecast model fitted without evaluation");
            return Ok(model);
        }

        let (x_train, x_test, y_train, y_test) =
            train_test_split(&x, &y, config.test_size as f32, true, Some(config.seed));
        let forest = fit_forest(&x_train, &y_train, config)?;
        let mut model = Self::from_forest(forest, encoder, y_train.len(), config);

        let evaluation = model.evaluate(&densematrix_to_ndarray(&x_test), &y_test)?;
        HELD_OUT_MAE_DAYS.set(evaluation.mae);
        info!(
            mae = evaluation.mae,
            rmse = evaluation.rmse,
            r_squared = evaluation.r_squared,
            test_rows = evaluation.n_samples,
            "Forecast model evaluated on held-out rows"
        );
        model.metadata.validation_metrics = Some(evaluation);

        Ok(model)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn from_forest(
        forest: Forest,
        encoder: CategoryEncoder,
        n_fitted: usize,
        config: &ModelConfig,
    ) -> Self {
        Self {
            metadata: ModelMetadata {
                name: "recurrence_forest".to_string(),
                model_type: ModelType::RandomForest,
                trained_at: chrono::Utc::now(),
                n_training_samples: n_fitted,
                n_features: N_FEATURES,
                validation_metrics: None,
                hyperparameters: config.hyperparameters(),
            },
            encoder,
            forest,
        }
    }
}

fn fit_forest(x: &DenseMatrix<f64>, y: &Vec<f64>, config: &ModelConfig) -> Result<Forest> {
    let mut params = RandomForestRegressorParameters::default()
        .with_n_trees(config.n_estimators.try_into().map_err(|_| {
            AppError::Configuration(format!(
                "n_estimators out of range: {}",
                config.n_estimators
            ))
        })?)
        .with_m(N_FEATURES)
        .with_seed(config.seed);
    if let Some(depth) = config.max_depth {
        params = params.with_max_depth(depth);
    }

    RandomForestRegressor::fit(x, y, params)
        .map_err(|e| AppError::Model(format!("Failed to train random forest: {}", e)))
}

fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

fn densematrix_to_ndarray(matrix: &DenseMatrix<f64>) -> Array2<f64> {
    let (rows, cols) = matrix.shape();
    Array2::from_shape_fn((rows, cols), |(r, c)| *matrix.get((r, c)))
}

impl Regressor for ForecastModel {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        if features.nrows() == 0 {
            return Ok(Vec::new());
        }
        if features.ncols() != N_FEATURES {
            return Err(AppError::Model(format!(
                "expected {} feature columns, got {}",
                N_FEATURES,
                features.ncols()
            )));
        }

        let x = ndarray_to_densematrix(features);
        self.forest
            .predict(&x)
            .map_err(|e| AppError::Model(format!("Prediction failed: {}", e)))
    }

    fn encoder(&self) -> &CategoryEncoder {
        &self.encoder
    }
}

/// Predicts the same value for every row
#[cfg(test)]
pub(crate) struct ConstantRegressor {
    value: f64,
    encoder: CategoryEncoder,
}

#[cfg(test)]
impl ConstantRegressor {
    pub(crate) fn new(value: f64, encoder: CategoryEncoder) -> Self {
        Self { value, encoder }
    }
}

#[cfg(test)]
impl Regressor for ConstantRegressor {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(vec![self.value; features.nrows()])
    }

    fn encoder(&self) -> &CategoryEncoder {
        &self.encoder
    }
}
