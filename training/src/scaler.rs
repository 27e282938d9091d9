use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    #[error("cannot fit a scaler on an empty feature matrix")]
    Empty,

    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Per-feature standardisation to zero mean and unit variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Uses population variance; constant features get a scale of 1.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ScalerError> {
        let first = rows.first().ok_or(ScalerError::Empty)?;
        let n_features = first.len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; n_features];
        for row in rows {
            check_width(row, n_features)?;
            for (acc, value) in mean.iter_mut().zip(row) {
                *acc += value;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = vec![0.0; n_features];
        for row in rows {
            for ((acc, value), m) in variance.iter_mut().zip(row).zip(&mean) {
                *acc += (value - m).powi(2);
            }
        }
        variance.iter_mut().for_each(|v| *v /= n);

        let scale = variance
            .iter()
            .map(|&v| if v == 0.0 { 1.0 } else { v.sqrt() })
            .collect();

        Ok(Self { mean, variance, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ScalerError> {
        check_width(row, self.n_features())?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ScalerError> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

fn check_width(row: &[f64], expected: usize) -> Result<(), ScalerError> {
    if row.len() != expected {
        return Err(ScalerError::DimensionMismatch {
            expected,
            actual: row.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_transform() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];

        let scaler = StandardScaler::fit(&rows).unwrap();

        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.variance, vec![1.0, 0.0]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);
        assert_eq!(scaler.transform_row(&[3.0, 7.0]).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(StandardScaler::fit(&[]), Err(ScalerError::Empty));

        let scaler = StandardScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert_eq!(
            scaler.transform_row(&[1.0]),
            Err(ScalerError::DimensionMismatch { expected: 2, actual: 1 })
        );
    }
}
