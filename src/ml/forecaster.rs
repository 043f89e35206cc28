//! Next-incident dates from predicted gaps
//!
//! Predictions are rounded half to even and added to each abuser's most
//! recent incident date.

use crate::analytics::round_half_even;
use crate::error::{AppError, Result};
use crate::metrics::{StageTimer, FORECASTS_TOTAL};
use crate::ml::encoder::UnseenCategory;
use crate::ml::features::{latest_incidents, FeatureBuilder};
use crate::ml::regressor::Regressor;
use crate::models::{ForecastResult, IncidentRecord, MetricsTable};
use tracing::{debug, info};

/// Forecast table plus the unseen category values met on the way
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub forecasts: Vec<ForecastResult>,
    pub unseen_categories: Vec<UnseenCategory>,
}

/// Turns a trained model's predicted gaps into next-incident dates
pub struct IncidentForecaster<'a> {
    model: &'a dyn Regressor,
}

impl<'a> IncidentForecaster<'a> {
    pub fn new(model: &'a dyn Regressor) -> Self {
        Self { model }
    }

    /// One forecast per abuser, ordered by abuser identifier
    pub fn forecast(
        &self,
        incidents: &[IncidentRecord],
        metrics: &MetricsTable,
    ) -> Result<ForecastOutput> {
        let _timer = StageTimer::start("forecast");

        let builder = FeatureBuilder::new(metrics, self.model.encoder());
        let matrix = builder.prediction_features(incidents)?;
        let predictions = self.model.predict(&matrix.features)?;

        if predictions.len() != matrix.abuser_ids.len() {
            return Err(AppError::PredictionCountMismatch {
                predictions: predictions.len(),
                abusers: matrix.abuser_ids.len(),
            });
        }

        let latest = latest_incidents(incidents);
        let mut forecasts = Vec::with_capacity(predictions.len());
        for ((abuser_id, predicted), incident) in
            matrix.abuser_ids.iter().zip(&predictions).zip(latest)
        {
            debug_assert_eq!(abuser_id, &incident.abuser_id);
            let days = round_half_even(*predicted);
            if days < 0 {
                return Err(AppError::NegativePrediction {
                    abuser_id: abuser_id.clone(),
                    days: *predicted,
                });
            }
            debug!(abuser_id = %abuser_id, predicted, days, "Forecast derived");
            forecasts.push(ForecastResult::derive(
                abuser_id,
                incident.incident_date,
                days,
            ));
        }

        FORECASTS_TOTAL.inc_by(forecasts.len() as f64);
        info!(
            forecasts = forecasts.len(),
            unseen_categories = matrix.unseen_categories.len(),
            "Forecasts generated"
        );

        Ok(ForecastOutput {
            forecasts,
            unseen_categories: matrix.unseen_categories,
        })
    }
}
