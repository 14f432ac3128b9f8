//! In-memory sample table shared by all readers

use fidstats_core::SampleBatch;
use ndarray::{Array2, Axis, IxDyn};
use std::collections::HashMap;

use crate::reader::{IoError, IoResult, SampleReader};

/// Samples stored row-wise as flat vectors, with optional labels
#[derive(Debug, Clone)]
pub struct SampleTable {
    /// `(N, product(sample_shape))`
    data: Array2<f32>,
    sample_shape: Vec<usize>,
    labels: Option<Vec<i64>>,
    metadata: HashMap<String, String>,
    path: Option<String>,
    format: &'static str,
}

impl SampleTable {
    /// Create a table, checking that rows, shape and labels agree
    pub fn new(
        data: Array2<f32>,
        sample_shape: Vec<usize>,
        labels: Option<Vec<i64>>,
    ) -> IoResult<Self> {
        let expected: usize = sample_shape.iter().product();
        if expected != data.ncols() {
            return Err(IoError::ShapeMismatch {
                expected: format!("{} values per sample ({:?})", expected, sample_shape),
                actual: data.ncols().to_string(),
            });
        }
        if let Some(labels) = &labels {
            if labels.len() != data.nrows() {
                return Err(IoError::ShapeMismatch {
                    expected: format!("{} labels", data.nrows()),
                    actual: labels.len().to_string(),
                });
            }
        }

        let mut metadata = HashMap::new();
        metadata.insert("num_samples".to_string(), data.nrows().to_string());
        metadata.insert("sample_shape".to_string(), format!("{:?}", sample_shape));

        Ok(Self {
            data,
            sample_shape,
            labels,
            metadata,
            path: None,
            format: "memory",
        })
    }

    /// Record where the table was loaded from
    pub fn with_source(mut self, path: impl Into<String>, format: &'static str) -> Self {
        self.path = Some(path.into());
        self.format = format;
        self.metadata.insert("format".to_string(), format.to_string());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }
}

impl SampleReader for SampleTable {
    fn len(&self) -> usize {
        self.data.nrows()
    }

    fn sample_shape(&self) -> &[usize] {
        &self.sample_shape
    }

    fn label(&self, index: usize) -> Option<i64> {
        self.labels.as_ref()?.get(index).copied()
    }

    fn read_indices(&self, indices: &[usize]) -> IoResult<SampleBatch> {
        let size = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= size) {
            return Err(IoError::OutOfBounds { index, size });
        }

        let mut shape = Vec::with_capacity(self.sample_shape.len() + 1);
        shape.push(indices.len());
        shape.extend_from_slice(&self.sample_shape);

        let samples = self
            .data
            .select(Axis(0), indices)
            .into_shape_with_order(IxDyn(&shape))
            .map_err(|e| IoError::InvalidFormat(e.to_string()))?;

        let batch = match &self.labels {
            Some(labels) => {
                SampleBatch::with_labels(samples, indices.iter().map(|&i| labels[i]).collect())?
            }
            None => SampleBatch::new(samples)?,
        };
        Ok(batch)
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn format_name(&self) -> &'static str {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SampleTable {
        let data = Array2::from_shape_fn((5, 4), |(i, j)| (i * 10 + j) as f32);
        SampleTable::new(data, vec![1, 2, 2], Some(vec![0, 1, 0, 1, 2])).unwrap()
    }

    #[test]
    fn test_read_indices_reshapes() {
        let batch = table().read_indices(&[4, 1]).unwrap();
        assert_eq!(batch.samples().shape(), &[2, 1, 2, 2]);
        assert_eq!(batch.samples()[[0, 0, 1, 1]], 43.0);
        assert_eq!(batch.labels(), Some(&[2, 1][..]));
    }

    #[test]
    fn test_read_range() {
        let batch = table().read_range(3, 5).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.samples()[[0, 0, 0, 0]], 30.0);
    }

    #[test]
    fn test_out_of_bounds() {
        let err = table().read_indices(&[0, 5]).unwrap_err();
        assert!(matches!(err, IoError::OutOfBounds { index: 5, size: 5 }));
    }

    #[test]
    fn test_shape_must_match_columns() {
        let data = Array2::<f32>::zeros((2, 4));
        assert!(SampleTable::new(data.clone(), vec![3], None).is_err());
        assert!(SampleTable::new(data, vec![4], Some(vec![1])).is_err());
    }
}
