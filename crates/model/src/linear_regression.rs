//! L2-regularized linear regression trained by batch gradient descent.

use crate::features::FeatureTransform;
use anyhow::{ensure, Result};
use ndarray::{Array1, Array2};

/// A cheap learned cost function over configurations.
pub trait SurrogateModel {
    /// Fit the model on raw feature rows (one per measured configuration)
    /// and their measured times.
    fn train(&mut self, x: &Array2<f32>, y: &Array1<f32>) -> Result<()>;

    /// Mean-squared error on a held-out split.
    fn validate(&self, x: &Array2<f32>, y: &Array1<f32>) -> Result<f32>;

    /// Predicted time for one raw feature row.
    fn predict(&self, features: &[f32]) -> Result<f32>;
}

/// Linear regression over normalized polynomial features.
///
/// Training runs `iterations` steps of batch gradient descent with learning
/// rate `learning_rate` and L2 strength `lambda`; the bias column is not
/// regularized.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    iterations: usize,
    learning_rate: f32,
    lambda: f32,
    degree: usize,
    transform: Option<FeatureTransform>,
    theta: Option<Array1<f32>>,
}

impl LinearRegression {
    pub fn new(iterations: usize, learning_rate: f32, lambda: f32) -> Self {
        Self {
            iterations,
            learning_rate,
            lambda,
            degree: 2,
            transform: None,
            theta: None,
        }
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new(800, 0.05, 0.5)
    }
}

impl SurrogateModel for LinearRegression {
    fn train(&mut self, x: &Array2<f32>, y: &Array1<f32>) -> Result<()> {
        ensure!(x.nrows() > 0, "training set is empty");
        ensure!(x.nrows() == y.len(), "feature/target row count mismatch");

        let transform = FeatureTransform::fit(x, self.degree);
        let features = transform.apply(x);
        let m = features.nrows() as f32;
        let mut theta: Array1<f32> = Array1::zeros(features.ncols());

        for _ in 0..self.iterations {
            let predictions = features.dot(&theta);
            let errors = &predictions - y;
            let mut gradient = features.t().dot(&errors).mapv_into(|g| g / m);
            for j in 1..gradient.len() {
                gradient[j] += (self.lambda / m) * theta[j];
            }
            theta.scaled_add(-self.learning_rate, &gradient);
        }

        self.transform = Some(transform);
        self.theta = Some(theta);
        Ok(())
    }

    fn validate(&self, x: &Array2<f32>, y: &Array1<f32>) -> Result<f32> {
        let transform = self.transform.as_ref();
        let theta = self.theta.as_ref();
        let (Some(transform), Some(theta)) = (transform, theta) else {
            anyhow::bail!("model has not been trained");
        };
        ensure!(x.nrows() == y.len(), "feature/target row count mismatch");
        if x.nrows() == 0 {
            return Ok(0.0);
        }
        let predictions = transform.apply(x).dot(theta);
        let mse = (&predictions - y).mapv(|e| e * e).sum() / x.nrows() as f32;
        Ok(mse)
    }

    fn predict(&self, features: &[f32]) -> Result<f32> {
        let transform = self.transform.as_ref();
        let theta = self.theta.as_ref();
        let (Some(transform), Some(theta)) = (transform, theta) else {
            anyhow::bail!("model has not been trained");
        };
        ensure!(
            features.len() == transform.input_width(),
            "expected {} features, got {}",
            transform.input_width(),
            features.len()
        );
        let expanded = transform.apply_row(features);
        Ok(expanded
            .iter()
            .zip(theta.iter())
            .map(|(f, t)| f * t)
            .sum())
    }
}
