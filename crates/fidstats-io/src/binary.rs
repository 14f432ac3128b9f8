//! Two-class view of a labelled dataset
//!
//! Keeps the samples of a positive and a negative class and relabels them
//! 1 and 0, for statistics of binary classification tasks.

use fidstats_core::SampleBatch;
use std::collections::HashMap;

use crate::reader::{IoError, IoResult, SampleReader};

/// Samples of `pos_class` (label 1) and `neg_class` (label 0) only
pub struct BinaryDataset<R> {
    inner: R,
    pos_class: i64,
    neg_class: i64,
    indices: Vec<usize>,
    metadata: HashMap<String, String>,
}

impl<R: SampleReader> BinaryDataset<R> {
    pub fn new(inner: R, pos_class: i64, neg_class: i64) -> IoResult<Self> {
        if pos_class == neg_class {
            return Err(IoError::InvalidOptions(format!(
                "positive and negative class are both {}",
                pos_class
            )));
        }

        let mut indices = Vec::new();
        for i in 0..inner.len() {
            let label = inner.label(i).ok_or_else(|| {
                IoError::MissingLabels(inner.path().unwrap_or("dataset").to_string())
            })?;
            if label == pos_class || label == neg_class {
                indices.push(i);
            }
        }

        let mut metadata = inner.metadata().clone();
        metadata.insert("num_samples".to_string(), indices.len().to_string());
        metadata.insert("binary".to_string(), format!("{}v{}", pos_class, neg_class));

        Ok(Self {
            inner,
            pos_class,
            neg_class,
            indices,
            metadata,
        })
    }

    pub fn classes(&self) -> (i64, i64) {
        (self.pos_class, self.neg_class)
    }

    fn relabel(&self, label: i64) -> i64 {
        i64::from(label == self.pos_class)
    }
}

impl<R: SampleReader> SampleReader for BinaryDataset<R> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn sample_shape(&self) -> &[usize] {
        self.inner.sample_shape()
    }

    fn label(&self, index: usize) -> Option<i64> {
        let inner = *self.indices.get(index)?;
        self.inner.label(inner).map(|l| self.relabel(l))
    }

    fn read_indices(&self, indices: &[usize]) -> IoResult<SampleBatch> {
        let size = self.len();
        let mapped = indices
            .iter()
            .map(|&i| {
                self.indices
                    .get(i)
                    .copied()
                    .ok_or(IoError::OutOfBounds { index: i, size })
            })
            .collect::<IoResult<Vec<usize>>>()?;

        let batch = self.inner.read_indices(&mapped)?;
        let labels = batch
            .labels()
            .ok_or_else(|| IoError::MissingLabels("binary subset batch".to_string()))?
            .iter()
            .map(|&l| self.relabel(l))
            .collect();
        Ok(SampleBatch::with_labels(batch.into_samples(), labels)?)
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    fn path(&self) -> Option<&str> {
        self.inner.path()
    }

    fn format_name(&self) -> &'static str {
        self.inner.format_name()
    }
}
