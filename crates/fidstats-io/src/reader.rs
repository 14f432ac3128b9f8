//! Sample reader trait and common types
//!
//! The `SampleReader` trait provides uniform, index-based access to the
//! samples of a dataset regardless of the file format it came from.

use fidstats_core::{FidError, SampleBatch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Debug, Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to open file: {0}")]
    OpenFailed(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Array not found: {0}")]
    MissingArray(String),

    #[error("Dataset has no labels: {0}")]
    MissingLabels(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Out of bounds: index {index}, size {size}")]
    OutOfBounds { index: usize, size: usize },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Batch(#[from] FidError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;

/// Options controlling how a dataset file is interpreted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetOptions {
    /// Shape of one sample, e.g. `[1, 28, 28]`; defaults to a flat vector
    pub sample_shape: Option<Vec<usize>>,
    /// CSV column holding the class label, if any
    pub label_column: Option<usize>,
    /// Whether the first CSV row is a header
    pub has_header: bool,
    /// CSV field delimiter; `.tsv` files use a tab when this is left at ','
    pub delimiter: char,
    /// Factor applied to every sample value (e.g. 1/255 for 8-bit pixels)
    pub scale: f32,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            sample_shape: None,
            label_column: Some(0),
            has_header: true,
            delimiter: ',',
            scale: 1.0,
        }
    }
}

impl DatasetOptions {
    /// Validate option values
    pub fn validate(&self) -> IoResult<()> {
        if !self.delimiter.is_ascii() {
            return Err(IoError::InvalidOptions(format!(
                "delimiter '{}' is not ASCII",
                self.delimiter
            )));
        }
        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(IoError::InvalidOptions(format!(
                "scale must be finite and non-zero, got {}",
                self.scale
            )));
        }
        if let Some(shape) = &self.sample_shape {
            if shape.is_empty() || shape.contains(&0) {
                return Err(IoError::InvalidOptions(format!(
                    "invalid sample shape {:?}",
                    shape
                )));
            }
        }
        Ok(())
    }
}

/// Trait for index-based access to dataset samples
pub trait SampleReader: Send + Sync {
    /// Number of samples
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of a single sample
    fn sample_shape(&self) -> &[usize];

    /// Class label of a sample, if the dataset is labelled
    fn label(&self, index: usize) -> Option<i64>;

    /// Read the given samples, in the given order, as one batch
    fn read_indices(&self, indices: &[usize]) -> IoResult<SampleBatch>;

    /// Read samples `start..end` as one batch
    fn read_range(&self, start: usize, end: usize) -> IoResult<SampleBatch> {
        let indices: Vec<usize> = (start..end).collect();
        self.read_indices(&indices)
    }

    /// Get metadata as key-value pairs
    fn metadata(&self) -> &HashMap<String, String>;

    /// Get the file path (if applicable)
    fn path(&self) -> Option<&str> {
        None
    }

    /// Get the format name
    fn format_name(&self) -> &'static str;
}

impl<R: SampleReader + ?Sized> SampleReader for Box<R> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn sample_shape(&self) -> &[usize] {
        (**self).sample_shape()
    }

    fn label(&self, index: usize) -> Option<i64> {
        (**self).label(index)
    }

    fn read_indices(&self, indices: &[usize]) -> IoResult<SampleBatch> {
        (**self).read_indices(indices)
    }

    fn read_range(&self, start: usize, end: usize) -> IoResult<SampleBatch> {
        (**self).read_range(start, end)
    }

    fn metadata(&self) -> &HashMap<String, String> {
        (**self).metadata()
    }

    fn path(&self) -> Option<&str> {
        (**self).path()
    }

    fn format_name(&self) -> &'static str {
        (**self).format_name()
    }
}

/// A boxed reader for dynamic dispatch
pub type BoxedReader = Box<dyn SampleReader>;

/// Open a dataset file and return an appropriate reader
///
/// The format is auto-detected from the file extension.
pub fn open_dataset(path: &str, options: &DatasetOptions) -> IoResult<BoxedReader> {
    options.validate()?;

    let extension = path
        .rsplit('.')
        .next()
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        #[cfg(feature = "csv")]
        "csv" => {
            use crate::csv_reader::CsvReader;
            Ok(Box::new(CsvReader::open(path, options)?))
        }

        #[cfg(feature = "csv")]
        "tsv" => {
            use crate::csv_reader::CsvReader;
            let mut options = options.clone();
            if options.delimiter == ',' {
                options.delimiter = '\t';
            }
            Ok(Box::new(CsvReader::open(path, &options)?))
        }

        #[cfg(feature = "npz")]
        "npz" => {
            use crate::npz::NpzReader;
            Ok(Box::new(NpzReader::open(path, options)?))
        }

        _ => Err(IoError::InvalidFormat(format!(
            "Unknown file extension: {}",
            extension
        ))),
    }
}

/// List supported file extensions
pub fn supported_extensions() -> Vec<&'static str> {
    let mut extensions = Vec::new();

    #[cfg(feature = "csv")]
    {
        extensions.push("csv");
        extensions.push("tsv");
    }

    #[cfg(feature = "npz")]
    {
        extensions.push("npz");
    }

    extensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        let extensions = supported_extensions();
        #[cfg(feature = "csv")]
        assert!(extensions.contains(&"csv"));
        #[cfg(feature = "npz")]
        assert!(extensions.contains(&"npz"));
    }

    #[test]
    fn test_unknown_extension() {
        let result = open_dataset("data/images.bin", &DatasetOptions::default());
        assert!(matches!(result, Err(IoError::InvalidFormat(_))));
    }

    #[test]
    fn test_options_validation() {
        assert!(DatasetOptions::default().validate().is_ok());

        let bad_scale = DatasetOptions {
            scale: 0.0,
            ..DatasetOptions::default()
        };
        assert!(bad_scale.validate().is_err());

        let bad_shape = DatasetOptions {
            sample_shape: Some(vec![1, 0, 28]),
            ..DatasetOptions::default()
        };
        assert!(bad_shape.validate().is_err());
    }
}
