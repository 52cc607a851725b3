//! Feature preprocessing: column normalization and polynomial expansion.

use ndarray::{Array1, Array2, Axis};

/// Normalization statistics captured at training time and reapplied at
/// inference, followed by a polynomial expansion of the normalized columns.
///
/// For degree 2 the expansion is: bias column, the normalized features,
/// their squares, and all pairwise products.
#[derive(Debug, Clone)]
pub struct FeatureTransform {
    means: Array1<f32>,
    stds: Array1<f32>,
    degree: usize,
}

impl FeatureTransform {
    /// Capture per-column mean and standard deviation from the training
    /// matrix. Constant columns normalize to zero (their deviation is
    /// treated as 1).
    pub fn fit(x: &Array2<f32>, degree: usize) -> Self {
        let means = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let stds = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        Self {
            means,
            stds,
            degree: degree.clamp(1, 2),
        }
    }

    pub fn input_width(&self) -> usize {
        self.means.len()
    }

    /// Width of the expanded feature vector, including the bias column.
    pub fn output_width(&self) -> usize {
        let n = self.input_width();
        match self.degree {
            1 => 1 + n,
            _ => 1 + 2 * n + n * (n - 1) / 2,
        }
    }

    /// Expand a single raw feature row.
    pub fn apply_row(&self, row: &[f32]) -> Vec<f32> {
        debug_assert_eq!(row.len(), self.input_width());
        let normalized: Vec<f32> = row
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(&v, (&mean, &std))| (v - mean) / std)
            .collect();

        let mut out = Vec::with_capacity(self.output_width());
        out.push(1.0);
        out.extend_from_slice(&normalized);
        if self.degree >= 2 {
            for &v in &normalized {
                out.push(v * v);
            }
            for i in 0..normalized.len() {
                for j in (i + 1)..normalized.len() {
                    out.push(normalized[i] * normalized[j]);
                }
            }
        }
        out
    }

    /// Expand a whole matrix, row by row.
    pub fn apply(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros((x.nrows(), self.output_width()));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let expanded = self.apply_row(&row.to_vec());
            for (j, v) in expanded.into_iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalization_is_zero_mean_unit_std() {
        let x = array![[1.0f32, 10.0], [3.0, 20.0], [5.0, 30.0]];
        let transform = FeatureTransform::fit(&x, 1);
        let expanded = transform.apply(&x);

        // Column 0 is the bias; columns 1-2 are the normalized features.
        for j in 1..3 {
            let column = expanded.column(j);
            let mean: f32 = column.iter().sum::<f32>() / 3.0;
            assert!(mean.abs() < 1e-6);
        }
        assert!(expanded.column(0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_degree_two_width() {
        let x = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let transform = FeatureTransform::fit(&x, 2);
        // 1 bias + 3 linear + 3 squares + 3 pairs
        assert_eq!(transform.output_width(), 10);
        assert_eq!(transform.apply(&x).ncols(), 10);
    }

    #[test]
    fn test_constant_column_does_not_divide_by_zero() {
        let x = array![[2.0f32], [2.0], [2.0]];
        let transform = FeatureTransform::fit(&x, 2);
        let expanded = transform.apply(&x);
        assert!(expanded.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_statistics_are_reapplied_at_inference() {
        let train = array![[0.0f32], [10.0]];
        let transform = FeatureTransform::fit(&train, 1);
        // Mean 5, std 5: the value 20 maps to (20-5)/5 = 3.
        let row = transform.apply_row(&[20.0]);
        assert_eq!(row, vec![1.0, 3.0]);
    }
}
