//! Built-in feature extractors
//!
//! - [`Flatten`]: raw sample values as features ("pixels")
//! - [`MlpClassifier`]: one hidden layer classifier whose hidden activations
//!   are exposed as feature maps

use ndarray::{Array1, Array2, ArrayViewD, Axis};

use crate::batch::BatchMeta;
use crate::error::ModelError;
use crate::extractor::{Classifier, ClassifierOutput, FeatureMapModel};

/// Flatten each sample to a row vector in row-major order
#[derive(Debug, Clone, Default)]
pub struct Flatten;

impl FeatureMapModel for Flatten {
    fn name(&self) -> &str {
        "pixels"
    }

    fn feature_maps(
        &self,
        batch: ArrayViewD<'_, f32>,
        _meta: &BatchMeta,
    ) -> Result<Array2<f32>, ModelError> {
        flatten(batch)
    }
}

fn flatten(batch: ArrayViewD<'_, f32>) -> Result<Array2<f32>, ModelError> {
    if batch.ndim() == 0 {
        return Err(ModelError::ShapeMismatch {
            expected: "(B, ...)".to_string(),
            actual: "scalar".to_string(),
        });
    }
    let rows = batch.len_of(Axis(0));
    let cols = batch.shape()[1..].iter().product::<usize>();
    batch
        .to_shape((rows, cols))
        .map(|flat| flat.into_owned())
        .map_err(|e| ModelError::Backend(e.to_string()))
}

/// Single hidden layer classifier
///
/// `hidden = relu(W x + b)` is the feature map, `logits = H hidden + c`.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    name: String,
    hidden_weight: Array2<f32>,
    hidden_bias: Array1<f32>,
    head_weight: Array2<f32>,
    head_bias: Array1<f32>,
    training: bool,
    output_feature_maps: bool,
}

impl MlpClassifier {
    /// Build from layer parameters
    ///
    /// `hidden_weight` is `(hidden, inputs)`, `head_weight` is `(classes, hidden)`.
    /// The model starts in training mode with feature-map output disabled.
    pub fn new(
        name: impl Into<String>,
        hidden_weight: Array2<f32>,
        hidden_bias: Array1<f32>,
        head_weight: Array2<f32>,
        head_bias: Array1<f32>,
    ) -> Result<Self, ModelError> {
        let hidden = hidden_weight.nrows();
        if hidden_bias.len() != hidden {
            return Err(shape_mismatch("hidden bias", hidden, hidden_bias.len()));
        }
        if head_weight.ncols() != hidden {
            return Err(shape_mismatch("head weight columns", hidden, head_weight.ncols()));
        }
        if head_bias.len() != head_weight.nrows() {
            return Err(shape_mismatch("head bias", head_weight.nrows(), head_bias.len()));
        }
        Ok(Self {
            name: name.into(),
            hidden_weight,
            hidden_bias,
            head_weight,
            head_bias,
            training: true,
            output_feature_maps: false,
        })
    }

    pub fn input_dims(&self) -> usize {
        self.hidden_weight.ncols()
    }

    pub fn hidden_dims(&self) -> usize {
        self.hidden_weight.nrows()
    }

    pub fn num_classes(&self) -> usize {
        self.head_weight.nrows()
    }
}

fn shape_mismatch(what: &str, expected: usize, actual: usize) -> ModelError {
    ModelError::ShapeMismatch {
        expected: format!("{} of length {}", what, expected),
        actual: actual.to_string(),
    }
}

impl Classifier for MlpClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_output_feature_maps(&mut self, enabled: bool) {
        self.output_feature_maps = enabled;
    }

    fn forward(
        &self,
        batch: ArrayViewD<'_, f32>,
        _meta: &BatchMeta,
    ) -> Result<ClassifierOutput, ModelError> {
        let inputs = flatten(batch)?;
        if inputs.ncols() != self.input_dims() {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{} input features", self.input_dims()),
                actual: inputs.ncols().to_string(),
            });
        }

        let mut hidden = inputs.dot(&self.hidden_weight.t()) + &self.hidden_bias;
        hidden.mapv_inplace(|v| v.max(0.0));
        let logits = hidden.dot(&self.head_weight.t()) + &self.head_bias;

        Ok(ClassifierOutput {
            logits,
            feature_maps: self.output_feature_maps.then_some(hidden),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array, IxDyn};

    fn toy_mlp() -> MlpClassifier {
        // 3 inputs -> 2 hidden -> 2 classes
        MlpClassifier::new(
            "toy",
            array![[1.0, 0.0, 0.0], [0.0, -1.0, 1.0]],
            array![0.0, 0.5],
            array![[1.0, 1.0], [1.0, -1.0]],
            array![0.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_flatten_images() {
        let images = Array::from_shape_fn(IxDyn(&[2, 1, 2, 2]), |idx| {
            (idx[0] * 4 + idx[2] * 2 + idx[3]) as f32
        });
        let features = Flatten
            .feature_maps(images.view(), &BatchMeta::probe())
            .unwrap();
        assert_eq!(features.shape(), &[2, 4]);
        assert_eq!(features.row(1).to_vec(), vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_mlp_forward() {
        let mut mlp = toy_mlp();
        mlp.eval();
        mlp.set_output_feature_maps(true);

        let x = Array::from_shape_vec(IxDyn(&[1, 3]), vec![2.0, 3.0, 1.0]).unwrap();
        let out = mlp.forward(x.view(), &BatchMeta::probe()).unwrap();

        // hidden = relu([2, -3 + 1 + 0.5]) = [2, 0]
        let hidden = out.feature_maps.unwrap();
        assert_eq!(hidden.row(0).to_vec(), vec![2.0, 0.0]);
        assert_eq!(out.logits.row(0).to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_mlp_feature_maps_off_by_default() {
        let mlp = toy_mlp();
        assert!(mlp.is_training());
        let x = Array::zeros(IxDyn(&[2, 3]));
        let out = mlp.forward(x.view(), &BatchMeta::probe()).unwrap();
        assert!(out.feature_maps.is_none());
    }

    #[test]
    fn test_mlp_rejects_bad_shapes() {
        let err = MlpClassifier::new(
            "bad",
            Array2::zeros((2, 3)),
            Array1::zeros(3),
            Array2::zeros((2, 2)),
            Array1::zeros(2),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));

        let mlp = toy_mlp();
        let x = Array::zeros(IxDyn(&[1, 4]));
        assert!(mlp.forward(x.view(), &BatchMeta::probe()).is_err());
    }
}
