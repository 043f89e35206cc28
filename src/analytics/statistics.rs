//! Descriptive statistics used by the risk report

use crate::error::{AppError, Result};
use serde::Serialize;

/// Distribution statistics (the numbers behind a box plot)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    /// Calculate distribution from a dataset
    pub fn from_data(data: &[f64]) -> Result<Self> {
        if data.is_empty() {
            return Err(AppError::InsufficientData(
                "Cannot calculate distribution from empty dataset".to_string(),
            ));
        }

        let count = data.len();
        let mean = data.iter().sum::<f64>() / count as f64;

        let mut sorted = data.to_vec();
        sorted.sort_by(f64::total_cmp);

        Ok(Self {
            count,
            mean,
            median: percentile(&sorted, 50.0),
            q1: percentile(&sorted, 25.0),
            q3: percentile(&sorted, 75.0),
            min: sorted[0],
            max: sorted[count - 1],
        })
    }
}

/// Linear-interpolated percentile of an already sorted slice
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        None
    } else {
        Some(data.iter().sum::<f64>() / data.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution() {
        let dist = Distribution::from_data(&[9.0, 1.0, 5.0, 3.0, 7.0]).unwrap();
        assert_eq!(dist.count, 5);
        assert_eq!(dist.mean, 5.0);
        assert_eq!(dist.median, 5.0);
        assert_eq!(dist.q1, 3.0);
        assert_eq!(dist.q3, 7.0);
        assert_eq!(dist.min, 1.0);
        assert_eq!(dist.max, 9.0);
    }

    #[test]
    fn test_empty_distribution_rejected() {
        assert!(Distribution::from_data(&[]).is_err());
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[1.0, 2.0], 50.0), 1.5);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
    }
}
