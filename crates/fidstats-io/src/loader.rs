//! Sequential batch loading over a sample reader

use fidstats_core::SampleBatch;

use crate::reader::{IoError, IoResult, SampleReader};

/// Yields `batch_size` samples at a time, in dataset order
///
/// The last batch holds the remainder when the batch size does not divide the
/// dataset size.
pub struct BatchLoader<R> {
    reader: R,
    batch_size: usize,
    cursor: usize,
}

impl<R: SampleReader> BatchLoader<R> {
    pub fn new(reader: R, batch_size: usize) -> IoResult<Self> {
        if batch_size == 0 {
            return Err(IoError::InvalidOptions(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(Self {
            reader,
            batch_size,
            cursor: 0,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.reader.len()
    }

    pub fn num_batches(&self) -> usize {
        self.reader.len().div_ceil(self.batch_size)
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: SampleReader> Iterator for BatchLoader<R> {
    type Item = IoResult<SampleBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.reader.len();
        if self.cursor >= n {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(n);
        let batch = self.reader.read_range(self.cursor, end);
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .reader
            .len()
            .saturating_sub(self.cursor)
            .div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}
