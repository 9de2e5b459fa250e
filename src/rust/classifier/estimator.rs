use std::fmt::Debug;

use ndarray::{Array1, Array2, ArrayView1};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{argmax, sigmoid, softmax};

/// Raw output of a decision model for one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// One probability per class, already summing to one
    Probabilities(Array1<f32>),
    /// Unbounded decision margins. A single margin is a two-class decision where a
    /// positive value favours the second class.
    Margins(Array1<f32>),
}

impl Decision {
    /// Resolves the decision to `(class index, confidence)` with confidence in `[0, 1]`.
    ///
    /// Probabilities are used as-is; a single two-class margin is squashed with the
    /// logistic function and multi-class margins with softmax.
    pub fn resolve(&self) -> Option<(usize, f32)> {
        let (index, confidence) = match self {
            Decision::Probabilities(p) => argmax(p.view()).map(|i| (i, p[i]))?,
            Decision::Margins(m) if m.len() == 1 => {
                let positive = sigmoid(m[0]);
                if m[0] > 0.0 {
                    (1, positive)
                } else {
                    (0, 1.0 - positive)
                }
            }
            Decision::Margins(m) => {
                let p = softmax(m.view());
                argmax(p.view()).map(|i| (i, p[i]))?
            }
        };
        Some((index, confidence.clamp(0.0, 1.0)))
    }
}

/// A fitted discriminative model mapping a feature vector to a [`Decision`].
pub trait DecisionModel: Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn decide(&self, features: ArrayView1<f32>) -> Decision;

    /// Checks that a deserialized model was fitted for `n_classes` classes over
    /// `dimension` features, reporting a mismatch as `ArtifactCorrupt`.
    fn check_shape(&self, n_classes: usize, dimension: usize) -> Result<(), ClassifierError>;
}

/// An algorithm family: its hyperparameters and how to fit a [`DecisionModel`].
///
/// Targets passed to [`Estimator::fit`] are class indices into the sorted label set, so
/// every family agrees on which index means which label.
pub trait Estimator: Debug + Default + Send + Sync + 'static {
    type Model: DecisionModel;

    /// Identifier under which the family is registered with the factory
    const NAME: &'static str;

    /// Effective hyperparameters, recorded in the training metadata
    fn params(&self) -> serde_json::Value;

    fn fit(
        &self,
        features: &Array2<f32>,
        targets: &[usize],
        n_classes: usize,
    ) -> Result<Self::Model, ClassifierError>;
}

/// Affine scores `W·x + b`, one row of `weights` per output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl LinearModel {
    pub fn zeros(outputs: usize, dimension: usize) -> Self {
        Self {
            weights: Array2::zeros((outputs, dimension)),
            bias: Array1::zeros(outputs),
        }
    }

    pub fn scores(&self, features: ArrayView1<f32>) -> Array1<f32> {
        self.weights.dot(&features) + &self.bias
    }

    pub fn check_shape(&self, outputs: usize, dimension: usize) -> Result<(), ClassifierError> {
        if self.weights.dim() != (outputs, dimension) || self.bias.len() != outputs {
            return Err(ClassifierError::ArtifactCorrupt(format!(
                "Linear model has {:?} weights and {} biases, expected ({}, {})",
                self.weights.dim(),
                self.bias.len(),
                outputs,
                dimension
            )));
        }
        Ok(())
    }
}
