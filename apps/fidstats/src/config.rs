//! Job configuration
//!
//! A job names one dataset, one extractor and an output location:
//!
//! ```toml
//! [run]
//! batch_size = 64
//! num_workers = 6
//! device = "cpu"
//!
//! [dataset]
//! path = "data/mnist_train.csv"
//! name = "mnist"
//! sample_shape = [1, 28, 28]
//! scale = 0.00392156862745098
//! pos_class = 3
//! neg_class = 0
//!
//! [extractor]
//! kind = "mlp"
//! weights = "models/digit-mlp.npz"
//!
//! [output]
//! dir = "fid-stats"
//! ```

use fidstats_core::RunConfig;
use fidstats_io::DatasetOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Complete job description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub run: RunConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Dataset file and how to read it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: String,
    /// Dataset name used in the stats file name; defaults to the file stem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `false` reads every column as a sample value
    #[serde(default = "default_labelled")]
    pub labelled: bool,
    #[serde(flatten)]
    pub options: DatasetOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_class: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neg_class: Option<i64>,
}

fn default_labelled() -> bool {
    true
}

/// Extractor selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorConfig {
    /// Raw sample values as features
    #[default]
    Pixels,
    /// Hidden layer of an MLP classifier loaded from `.npz` weights
    Mlp { weights: PathBuf },
}

/// Where the statistics go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Explicit file name (without extension)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("fid-stats"),
            name: None,
        }
    }
}

impl JobConfig {
    /// Job over `path` with default settings
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            run: RunConfig::default(),
            dataset: DatasetConfig {
                path: path.into(),
                name: None,
                labelled: true,
                options: DatasetOptions::default(),
                pos_class: None,
                neg_class: None,
            },
            extractor: ExtractorConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Load a configuration file; `.json` is read as JSON, anything else as TOML
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(Self::from_json(&text)?)
        } else {
            Ok(Self::from_toml(&text)?)
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Reader options with the label column dropped for unlabelled datasets
    pub fn dataset_options(&self) -> DatasetOptions {
        let mut options = self.dataset.options.clone();
        if !self.dataset.labelled {
            options.label_column = None;
        }
        options
    }

    /// Positive and negative class of a binary task
    pub fn binary(&self) -> Option<(i64, i64)> {
        self.dataset.pos_class.zip(self.dataset.neg_class)
    }

    /// Dataset name for the stats file
    pub fn dataset_name(&self) -> String {
        if let Some(name) = &self.dataset.name {
            return name.clone();
        }
        Path::new(&self.dataset.path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dataset.path.clone())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        if self.dataset.path.trim().is_empty() {
            return Err(ConfigError::MissingField("dataset.path".to_string()));
        }
        self.dataset
            .options
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        match (self.dataset.pos_class, self.dataset.neg_class) {
            (Some(pos), Some(neg)) if pos == neg => {
                return Err(ConfigError::InvalidValue(format!(
                    "pos_class and neg_class are both {}",
                    pos
                )));
            }
            (Some(_), None) => {
                return Err(ConfigError::MissingField("dataset.neg_class".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingField("dataset.pos_class".to_string()));
            }
            _ => {}
        }
        if self.binary().is_some() && !self.dataset.labelled {
            return Err(ConfigError::InvalidValue(
                "a binary task needs a labelled dataset".to_string(),
            ));
        }

        if let ExtractorConfig::Mlp { weights } = &self.extractor {
            if weights.as_os_str().is_empty() {
                return Err(ConfigError::MissingField("extractor.weights".to_string()));
            }
        }

        if self.output.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ConfigError::InvalidValue("output.name is empty".to_string()));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config: {0}")]
    Read(String),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
