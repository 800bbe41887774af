//! Per-column standardization fit on a training batch and reused unmodified
//! at inference time.

use crate::error::{ProcessorError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Variance below this counts as a constant column.
const MIN_STD: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and scale over the feature table (rows = sessions).
    ///
    /// An empty table or a table where every column is constant is rejected
    /// as [`ProcessorError::DegenerateBatch`]. A single constant column gets
    /// unit scale so one-hot bucket columns do not sink a whole batch.
    pub fn fit(table: &Array2<f64>) -> Result<Self> {
        let rows = table.nrows();
        let cols = table.ncols();
        if rows == 0 || cols == 0 {
            return Err(ProcessorError::DegenerateBatch(
                "no usable rows to standardize".to_string(),
            ));
        }

        let n = rows as f64;
        let mut mean = vec![0.0; cols];
        for row in table.rows() {
            for (c, v) in row.iter().enumerate() {
                mean[c] += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; cols];
        for row in table.rows() {
            for (c, v) in row.iter().enumerate() {
                let d = v - mean[c];
                variance[c] += d * d;
            }
        }

        let mut constant_cols = 0usize;
        let scale: Vec<f64> = variance
            .iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std < MIN_STD {
                    constant_cols += 1;
                    1.0
                } else {
                    std
                }
            })
            .collect();

        if constant_cols == cols {
            return Err(ProcessorError::DegenerateBatch(
                "every feature column is constant across the batch".to_string(),
            ));
        }

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, table: &Array2<f64>) -> Array2<f64> {
        let mut out = table.clone();
        for mut row in out.rows_mut() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[c]) / self.scale[c];
            }
        }
        out
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn fit_and_transform_centers_and_scales() {
        let table = arr2(&[[1.0, 10.0], [3.0, 10.0]]);
        let scaler = StandardScaler::fit(&table).unwrap();
        assert!((scaler.mean[0] - 2.0).abs() < 1e-12);
        // Constant column keeps unit scale.
        assert_eq!(scaler.scale[1], 1.0);

        let scaled = scaler.transform(&table);
        assert!((scaled[(0, 0)] + 1.0).abs() < 1e-12);
        assert!((scaled[(1, 0)] - 1.0).abs() < 1e-12);
        assert_eq!(scaled[(0, 1)], 0.0);
    }

    #[test]
    fn empty_table_is_degenerate() {
        let table = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            StandardScaler::fit(&table),
            Err(ProcessorError::DegenerateBatch(_))
        ));
    }

    #[test]
    fn all_constant_columns_are_degenerate() {
        let table = arr2(&[[2.0, 5.0], [2.0, 5.0], [2.0, 5.0]]);
        assert!(matches!(
            StandardScaler::fit(&table),
            Err(ProcessorError::DegenerateBatch(_))
        ));
    }

    #[test]
    fn transform_row_matches_table_transform() {
        let table = arr2(&[[1.0, 4.0], [3.0, 8.0]]);
        let scaler = StandardScaler::fit(&table).unwrap();
        let scaled = scaler.transform(&table);
        let row = scaler.transform_row(&[1.0, 4.0]);
        assert!((row[0] - scaled[(0, 0)]).abs() < 1e-12);
        assert!((row[1] - scaled[(0, 1)]).abs() < 1e-12);
    }
}
