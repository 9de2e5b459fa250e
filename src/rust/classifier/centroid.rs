use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::ClassifierError;
use super::estimator::{Decision, DecisionModel, Estimator};
use super::utils::{average_vectors, normalize_vector};

/// Nearest-prototype classifier: each class is represented by the normalised mean of
/// its training vectors and a document is scored by cosine similarity to each prototype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidEstimator {
    /// Multiplier applied to similarities before softmax; higher values give sharper
    /// confidences
    pub scale: f32,
}

impl Default for CentroidEstimator {
    fn default() -> Self {
        Self { scale: 10.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    prototypes: Array2<f32>,
    scale: f32,
}

impl DecisionModel for CentroidModel {
    fn decide(&self, features: ArrayView1<f32>) -> Decision {
        Decision::Margins(self.prototypes.dot(&features) * self.scale)
    }

    fn check_shape(&self, n_classes: usize, dimension: usize) -> Result<(), ClassifierError> {
        if self.prototypes.dim() != (n_classes, dimension) {
            return Err(ClassifierError::ArtifactCorrupt(format!(
                "Expected {} prototypes of dimension {}, found {:?}",
                n_classes,
                dimension,
                self.prototypes.dim()
            )));
        }
        Ok(())
    }
}

impl Estimator for CentroidEstimator {
    type Model = CentroidModel;
    const NAME: &'static str = "centroid";

    fn params(&self) -> serde_json::Value {
        json!({
            "metric": "cosine",
            "scale": self.scale,
        })
    }

    fn fit(
        &self,
        features: &Array2<f32>,
        targets: &[usize],
        n_classes: usize,
    ) -> Result<CentroidModel, ClassifierError> {
        if n_classes < 2 {
            return Err(ClassifierError::TrainingError(format!(
                "The number of classes has to be greater than one; got {} class",
                n_classes
            )));
        }
        let dimension = features.ncols();
        let mut prototypes = Array2::zeros((n_classes, dimension));

        for (class, mut prototype) in prototypes.rows_mut().into_iter().enumerate() {
            let members: Vec<ArrayView1<f32>> = features
                .rows()
                .into_iter()
                .zip(targets)
                .filter(|(_, &t)| t == class)
                .map(|(row, _)| row)
                .collect();
            if members.is_empty() {
                return Err(ClassifierError::TrainingError(format!(
                    "Class index {} has no training samples",
                    class
                )));
            }
            prototype.assign(&normalize_vector(&average_vectors(&members, dimension)));
        }

        Ok(CentroidModel {
            prototypes,
            scale: self.scale,
        })
    }
}
