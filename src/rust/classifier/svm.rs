use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::ClassifierError;
use super::estimator::{Decision, DecisionModel, Estimator, LinearModel};

/// Linear support vector machine trained by stochastic gradient descent on the hinge
/// loss with L2 regularisation.
///
/// Two classes share a single weight vector; more classes are handled one-vs-rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmEstimator {
    /// L2 regularisation strength
    pub alpha: f32,
    /// Number of passes over the training data
    pub max_iter: usize,
    /// Initial learning rate
    pub eta0: f32,
    /// Weight samples inversely to their class frequency
    pub balanced: bool,
    /// Seed for the per-epoch sample shuffling
    pub random_state: u64,
}

impl Default for SvmEstimator {
    fn default() -> Self {
        Self {
            alpha: 1e-4,
            max_iter: 50,
            eta0: 0.5,
            balanced: true,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    linear: LinearModel,
}

impl DecisionModel for SvmModel {
    fn decide(&self, features: ArrayView1<f32>) -> Decision {
        Decision::Margins(self.linear.scores(features))
    }

    fn check_shape(&self, n_classes: usize, dimension: usize) -> Result<(), ClassifierError> {
        let outputs = if n_classes == 2 { 1 } else { n_classes };
        self.linear.check_shape(outputs, dimension)
    }
}

impl Estimator for SvmEstimator {
    type Model = SvmModel;
    const NAME: &'static str = "svm";

    fn params(&self) -> serde_json::Value {
        json!({
            "loss": "hinge",
            "alpha": self.alpha,
            "max_iter": self.max_iter,
            "eta0": self.eta0,
            "class_weight": if self.balanced { "balanced" } else { "none" },
            "random_state": self.random_state,
        })
    }

    fn fit(
        &self,
        features: &Array2<f32>,
        targets: &[usize],
        n_classes: usize,
    ) -> Result<SvmModel, ClassifierError> {
        if n_classes < 2 {
            return Err(ClassifierError::TrainingError(format!(
                "The number of classes has to be greater than one; got {} class",
                n_classes
            )));
        }
        let (n_samples, dimension) = features.dim();
        let class_weights = class_weights(targets, n_classes, self.balanced);
        let outputs = if n_classes == 2 { 1 } else { n_classes };

        let mut linear = LinearModel::zeros(outputs, dimension);
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut order: Vec<usize> = (0..n_samples).collect();

        for output in 0..outputs {
            // With a single output the second class is the positive side.
            let positive = if outputs == 1 { 1 } else { output };
            let mut w = Array1::<f32>::zeros(dimension);
            let mut b = 0.0f32;
            let mut step_count = 0usize;

            for _ in 0..self.max_iter {
                order.shuffle(&mut rng);
                for &i in &order {
                    let eta = self.eta0 / (1.0 + self.alpha * self.eta0 * step_count as f32);
                    step_count += 1;

                    let y = if targets[i] == positive { 1.0 } else { -1.0 };
                    let x = features.row(i);
                    let margin = y * (w.dot(&x) + b);

                    w *= 1.0 - eta * self.alpha;
                    if margin < 1.0 {
                        let step = eta * y * class_weights[targets[i]];
                        w.scaled_add(step, &x);
                        b += step;
                    }
                }
            }

            if !b.is_finite() || w.iter().any(|v| !v.is_finite()) {
                return Err(ClassifierError::TrainingError(
                    "SGD diverged; try a smaller eta0".into(),
                ));
            }
            linear.weights.row_mut(output).assign(&w);
            linear.bias[output] = b;
        }

        Ok(SvmModel { linear })
    }
}

/// `n_samples / (n_classes * count(class))` when balanced, otherwise uniform.
pub(crate) fn class_weights(targets: &[usize], n_classes: usize, balanced: bool) -> Vec<f32> {
    if !balanced {
        return vec![1.0; n_classes];
    }
    let mut counts = vec![0usize; n_classes];
    for &t in targets {
        counts[t] += 1;
    }
    counts
        .iter()
        .map(|&c| {
            if c == 0 {
                0.0
            } else {
                targets.len() as f32 / (n_classes as f32 * c as f32)
            }
        })
        .collect()
}
