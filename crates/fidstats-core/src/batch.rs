//! Sample batches and batch sources
//!
//! A batch source is any iterator of `Result<SampleBatch, E>`. This module
//! provides the batch type itself plus two sources: an in-memory splitter and
//! a prefetching wrapper that prepares batches on a worker thread.

use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use crate::error::{FidError, FidResult};

/// A batch of raw samples, batch axis first
#[derive(Debug, Clone)]
pub struct SampleBatch {
    samples: ArrayD<f32>,
    labels: Option<Vec<i64>>,
}

impl SampleBatch {
    /// Create a batch from an array shaped `(B, ...)` with `B >= 1`
    pub fn new(samples: ArrayD<f32>) -> FidResult<Self> {
        if samples.ndim() == 0 {
            return Err(FidError::InvalidBatch(
                "samples must have a leading batch axis".to_string(),
            ));
        }
        if samples.len_of(Axis(0)) == 0 {
            return Err(FidError::InvalidBatch("batch is empty".to_string()));
        }
        Ok(Self {
            samples,
            labels: None,
        })
    }

    /// Create a batch with one label per sample
    pub fn with_labels(samples: ArrayD<f32>, labels: Vec<i64>) -> FidResult<Self> {
        let mut batch = Self::new(samples)?;
        if labels.len() != batch.len() {
            return Err(FidError::InvalidBatch(format!(
                "{} labels for {} samples",
                labels.len(),
                batch.len()
            )));
        }
        batch.labels = Some(labels);
        Ok(batch)
    }

    /// Number of samples (B)
    pub fn len(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    /// Always false; empty batches cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples(&self) -> ArrayViewD<'_, f32> {
        self.samples.view()
    }

    pub fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }

    /// Shape of a single sample (without the batch axis)
    pub fn sample_shape(&self) -> &[usize] {
        &self.samples.shape()[1..]
    }

    /// View of the first sample, keeping the batch axis (shape `(1, ...)`)
    pub fn probe(&self) -> ArrayViewD<'_, f32> {
        self.samples.slice_axis(Axis(0), Slice::from(0..1))
    }

    pub fn into_samples(self) -> ArrayD<f32> {
        self.samples
    }
}

/// Position of a batch within the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMeta {
    /// Zero-based batch number
    pub index: usize,
    /// Dataset index of the batch's first sample
    pub offset: usize,
    /// Number of samples in the batch
    pub len: usize,
}

impl BatchMeta {
    pub fn new(index: usize, offset: usize, len: usize) -> Self {
        Self { index, offset, len }
    }

    /// Metadata for the single-sample probe call
    pub fn probe() -> Self {
        Self::new(0, 0, 1)
    }

    /// Dataset index range covered by the batch
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Splits an in-memory array `(N, ...)` into batches of `batch_size`
///
/// The last batch holds the remainder when `batch_size` does not divide `N`.
#[derive(Debug, Clone)]
pub struct InMemoryBatches {
    data: ArrayD<f32>,
    batch_size: usize,
    cursor: usize,
}

impl InMemoryBatches {
    pub fn new(data: ArrayD<f32>, batch_size: usize) -> FidResult<Self> {
        if batch_size == 0 {
            return Err(FidError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if data.ndim() == 0 {
            return Err(FidError::InvalidBatch(
                "data must have a leading sample axis".to_string(),
            ));
        }
        Ok(Self {
            data,
            batch_size,
            cursor: 0,
        })
    }

    /// Total number of samples
    pub fn num_samples(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Total number of batches, counting a short final batch
    pub fn num_batches(&self) -> usize {
        self.num_samples().div_ceil(self.batch_size)
    }
}

impl Iterator for InMemoryBatches {
    type Item = FidResult<SampleBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.num_samples();
        if self.cursor >= n {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(n);
        let chunk = self
            .data
            .slice_axis(Axis(0), Slice::from(self.cursor..end))
            .to_owned();
        self.cursor = end;
        Some(SampleBatch::new(chunk))
    }
}

/// Prepares batches on a background thread
///
/// Batches are handed over through a bounded channel of `depth` slots, in
/// source order. There is exactly one worker thread whatever the depth; the
/// depth only sets how far it may run ahead. Only batch production runs on
/// the worker; extraction and accumulation stay on the consuming thread.
pub struct Prefetch {
    receiver: Receiver<FidResult<SampleBatch>>,
    worker: Option<JoinHandle<()>>,
}

impl Prefetch {
    pub fn new<I, E>(source: I, depth: usize) -> Self
    where
        I: IntoIterator<Item = Result<SampleBatch, E>>,
        I::IntoIter: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (sender, receiver) = mpsc::sync_channel(depth.max(1));
        let batches = source.into_iter();
        let worker = thread::spawn(move || {
            for batch in batches {
                let failed = batch.is_err();
                // Receiver gone: the consumer stopped early
                if sender.send(batch.map_err(FidError::source)).is_err() || failed {
                    break;
                }
            }
        });
        Self {
            receiver,
            worker: Some(worker),
        }
    }
}

impl Iterator for Prefetch {
    type Item = FidResult<SampleBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.receiver.recv() {
            Ok(batch) => Some(batch),
            Err(_) => {
                let worker = self.worker.take()?;
                match worker.join() {
                    Ok(()) => None,
                    Err(_) => Some(Err(FidError::source("prefetch worker panicked"))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn ramp(n: usize, d: usize) -> ArrayD<f32> {
        Array::from_shape_fn(IxDyn(&[n, d]), |idx| (idx[0] * d + idx[1]) as f32)
    }

    #[test]
    fn test_empty_batch_rejected() {
        let empty = ArrayD::<f32>::zeros(IxDyn(&[0, 3]));
        assert!(matches!(
            SampleBatch::new(empty),
            Err(FidError::InvalidBatch(_))
        ));
    }

    #[test]
    fn test_label_count_must_match() {
        assert!(SampleBatch::with_labels(ramp(3, 2), vec![0, 1]).is_err());
        let batch = SampleBatch::with_labels(ramp(3, 2), vec![0, 1, 1]).unwrap();
        assert_eq!(batch.labels(), Some(&[0, 1, 1][..]));
    }

    #[test]
    fn test_probe_keeps_batch_axis() {
        let batch = SampleBatch::new(ramp(5, 4)).unwrap();
        assert_eq!(batch.probe().shape(), &[1, 4]);
        assert_eq!(batch.sample_shape(), &[4]);
    }

    #[test]
    fn test_in_memory_batches_remainder() {
        let batches: Vec<_> = InMemoryBatches::new(ramp(100, 4), 32)
            .unwrap()
            .collect::<FidResult<_>>()
            .unwrap();
        let sizes: Vec<usize> = batches.iter().map(SampleBatch::len).collect();
        assert_eq!(sizes, vec![32, 32, 32, 4]);
        assert_eq!(batches[3].samples()[[0, 0]], (96 * 4) as f32);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(InMemoryBatches::new(ramp(4, 2), 0).is_err());
    }

    #[test]
    fn test_batch_meta_range() {
        let meta = BatchMeta::new(2, 64, 32);
        assert_eq!(meta.range(), 64..96);
        assert_eq!(BatchMeta::probe().range(), 0..1);
    }

    #[test]
    fn test_prefetch_preserves_order() {
        let source = InMemoryBatches::new(ramp(10, 1), 3).unwrap();
        let firsts: Vec<f32> = Prefetch::new(source, 2)
            .map(|b| b.unwrap().samples()[[0, 0]])
            .collect();
        assert_eq!(firsts, vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_prefetch_forwards_errors() {
        let source: Vec<Result<SampleBatch, std::io::Error>> = vec![
            Ok(SampleBatch::new(ramp(2, 1)).unwrap()),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")),
            Ok(SampleBatch::new(ramp(2, 1)).unwrap()),
        ];
        let results: Vec<_> = Prefetch::new(source, 1).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(FidError::Source(_))));
    }
}
