//! Feature extractor adapter
//!
//! Two model shapes produce feature maps:
//!
//! - [`FeatureMapModel`]: a fixed extractor whose output *is* the feature map
//! - [`Classifier`]: a user model whose feature maps are a secondary output
//!   next to its logits
//!
//! [`FeatureExtractor`] hides the difference behind a single
//! `extract(batch, meta)` call. It is built once per run: the model is put
//! into evaluation mode, checked against the configured device, and probed on
//! a single sample to fix the feature dimensionality D. After that the model
//! is only ever borrowed immutably.

use ndarray::{Array2, ArrayViewD, Axis};
use tracing::info;

use crate::batch::{BatchMeta, SampleBatch};
use crate::device::Device;
use crate::error::{FidError, FidResult, ModelError};

/// A fixed model that returns feature maps directly
pub trait FeatureMapModel {
    /// Short model name, used in logs and output naming
    fn name(&self) -> &str;

    fn supports_device(&self, device: &Device) -> bool {
        device.is_cpu()
    }

    /// Switch to inference mode
    fn eval(&mut self) {}

    fn is_training(&self) -> bool {
        false
    }

    /// Feature maps for a batch shaped `(B, ...)`, returned as `(B, D)`
    fn feature_maps(
        &self,
        batch: ArrayViewD<'_, f32>,
        meta: &BatchMeta,
    ) -> Result<Array2<f32>, ModelError>;
}

/// Output of a classifier forward pass
#[derive(Debug, Clone)]
pub struct ClassifierOutput {
    pub logits: Array2<f32>,
    /// Present only when feature-map output is enabled
    pub feature_maps: Option<Array2<f32>>,
}

/// A user-supplied classifier exposing feature maps as a secondary output
pub trait Classifier {
    fn name(&self) -> &str;

    fn supports_device(&self, device: &Device) -> bool {
        device.is_cpu()
    }

    /// Switch to inference mode
    fn eval(&mut self);

    fn is_training(&self) -> bool;

    /// Toggle whether `forward` also returns feature maps
    fn set_output_feature_maps(&mut self, enabled: bool);

    fn forward(
        &self,
        batch: ArrayViewD<'_, f32>,
        meta: &BatchMeta,
    ) -> Result<ClassifierOutput, ModelError>;
}

/// Configuration-time choice of extractor shape
pub enum ExtractorSpec {
    FeatureMaps(Box<dyn FeatureMapModel>),
    Classifier(Box<dyn Classifier>),
}

impl ExtractorSpec {
    pub fn feature_maps(model: impl FeatureMapModel + 'static) -> Self {
        ExtractorSpec::FeatureMaps(Box::new(model))
    }

    pub fn classifier(model: impl Classifier + 'static) -> Self {
        ExtractorSpec::Classifier(Box::new(model))
    }

    pub fn name(&self) -> &str {
        match self {
            ExtractorSpec::FeatureMaps(model) => model.name(),
            ExtractorSpec::Classifier(model) => model.name(),
        }
    }

    fn supports_device(&self, device: &Device) -> bool {
        match self {
            ExtractorSpec::FeatureMaps(model) => model.supports_device(device),
            ExtractorSpec::Classifier(model) => model.supports_device(device),
        }
    }

    fn prepare(&mut self) -> FidResult<()> {
        let training = match self {
            ExtractorSpec::FeatureMaps(model) => {
                model.eval();
                model.is_training()
            }
            ExtractorSpec::Classifier(model) => {
                model.eval();
                model.set_output_feature_maps(true);
                model.is_training()
            }
        };
        if training {
            return Err(FidError::ExtractorInitialization(format!(
                "model '{}' is still in training mode after eval()",
                self.name()
            )));
        }
        Ok(())
    }

    fn run(&self, batch: ArrayViewD<'_, f32>, meta: &BatchMeta) -> Result<Array2<f32>, String> {
        match self {
            ExtractorSpec::FeatureMaps(model) => {
                model.feature_maps(batch, meta).map_err(|e| e.to_string())
            }
            ExtractorSpec::Classifier(model) => model
                .forward(batch, meta)
                .map_err(|e| e.to_string())?
                .feature_maps
                .ok_or_else(|| "classifier returned no feature maps".to_string()),
        }
    }
}

impl std::fmt::Debug for ExtractorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ExtractorSpec::FeatureMaps(_) => "FeatureMaps",
            ExtractorSpec::Classifier(_) => "Classifier",
        };
        f.debug_struct("ExtractorSpec")
            .field("kind", &kind)
            .field("name", &self.name())
            .finish()
    }
}

/// A probed extractor with frozen output dimensionality
#[derive(Debug)]
pub struct FeatureExtractor {
    backend: ExtractorSpec,
    device: Device,
    dims: usize,
}

impl FeatureExtractor {
    /// Prepare the model and fix D by probing it on `probe` (shape `(1, ...)`)
    pub fn new(
        mut spec: ExtractorSpec,
        device: Device,
        probe: ArrayViewD<'_, f32>,
    ) -> FidResult<Self> {
        if !spec.supports_device(&device) {
            return Err(FidError::ExtractorInitialization(
                ModelError::UnsupportedDevice(device).to_string(),
            ));
        }
        spec.prepare()?;

        if probe.ndim() == 0 || probe.len_of(Axis(0)) != 1 {
            return Err(FidError::ExtractorInitialization(format!(
                "probe must hold exactly one sample, got shape {:?}",
                probe.shape()
            )));
        }

        let features = spec
            .run(probe, &BatchMeta::probe())
            .map_err(FidError::ExtractorInitialization)?;
        if features.nrows() != 1 || features.ncols() == 0 {
            return Err(FidError::ExtractorInitialization(format!(
                "probe produced feature shape {:?}, expected (1, D) with D > 0",
                features.shape()
            )));
        }

        let dims = features.ncols();
        info!(extractor = spec.name(), dims, device = %device, "Feature extractor ready");

        Ok(Self {
            backend: spec,
            device,
            dims,
        })
    }

    /// Feature dimensionality D
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Feature matrix `(B, D)` for a batch
    pub fn extract(&self, batch: &SampleBatch, meta: &BatchMeta) -> FidResult<Array2<f32>> {
        let failure = |message: String| FidError::ExtractionFailure {
            batch: meta.index,
            message,
        };

        let features = self.backend.run(batch.samples(), meta).map_err(failure)?;
        if features.nrows() != batch.len() {
            return Err(failure(format!(
                "expected {} feature rows, got {}",
                batch.len(),
                features.nrows()
            )));
        }
        if features.ncols() != self.dims {
            return Err(failure(format!(
                "feature dimensionality changed from {} to {}",
                self.dims,
                features.ncols()
            )));
        }
        Ok(features)
    }
}
