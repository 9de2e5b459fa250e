use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::ClassifierError;
use super::estimator::{Decision, DecisionModel, Estimator, LinearModel};
use super::utils::softmax;

/// Multinomial logistic regression fitted by full-batch gradient descent.
///
/// Unlike the margin-based families this one yields class probabilities directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticEstimator {
    pub learning_rate: f32,
    pub max_iter: usize,
    /// L2 penalty on the weights (the bias is not penalised)
    pub l2: f32,
}

impl Default for LogisticEstimator {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            max_iter: 300,
            l2: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    linear: LinearModel,
}

impl DecisionModel for LogisticModel {
    fn decide(&self, features: ArrayView1<f32>) -> Decision {
        Decision::Probabilities(softmax(self.linear.scores(features).view()))
    }

    fn check_shape(&self, n_classes: usize, dimension: usize) -> Result<(), ClassifierError> {
        self.linear.check_shape(n_classes, dimension)
    }
}

impl Estimator for LogisticEstimator {
    type Model = LogisticModel;
    const NAME: &'static str = "logistic";

    fn params(&self) -> serde_json::Value {
        json!({
            "loss": "log_loss",
            "learning_rate": self.learning_rate,
            "max_iter": self.max_iter,
            "l2": self.l2,
        })
    }

    fn fit(
        &self,
        features: &Array2<f32>,
        targets: &[usize],
        n_classes: usize,
    ) -> Result<LogisticModel, ClassifierError> {
        if n_classes < 2 {
            return Err(ClassifierError::TrainingError(format!(
                "The number of classes has to be greater than one; got {} class",
                n_classes
            )));
        }
        let (n_samples, dimension) = features.dim();
        let n = n_samples as f32;
        let mut linear = LinearModel::zeros(n_classes, dimension);

        for _ in 0..self.max_iter {
            // (n_samples, n_classes) residuals: predicted probability minus one-hot target
            let mut residuals = features.dot(&linear.weights.t()) + &linear.bias;
            for (mut row, &target) in residuals.axis_iter_mut(Axis(0)).zip(targets) {
                let p = softmax(row.view());
                row.assign(&p);
                row[target] -= 1.0;
            }

            let grad_w = residuals.t().dot(features) / n + &(&linear.weights * self.l2);
            let grad_b = residuals.sum_axis(Axis(0)) / n;
            linear.weights.scaled_add(-self.learning_rate, &grad_w);
            linear.bias.scaled_add(-self.learning_rate, &grad_b);
        }

        if linear.weights.iter().chain(linear.bias.iter()).any(|v| !v.is_finite()) {
            return Err(ClassifierError::TrainingError(
                "Gradient descent diverged; try a smaller learning_rate".into(),
            ));
        }
        Ok(LogisticModel { linear })
    }
}
