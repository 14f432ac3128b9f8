//! Batch source -> extractor -> aggregator loop
//!
//! The loop is strictly sequential: each batch is extracted and folded into
//! the aggregator before the next one is pulled. Any failure aborts the
//! aggregator and is returned as is; nothing partial is ever surfaced.

use std::error::Error;
use std::iter;

use tracing::{debug, info};

use crate::aggregator::{ActivationStatistics, CovarianceNormalization, StatsAggregator};
use crate::batch::{BatchMeta, SampleBatch};
use crate::config::RunConfig;
use crate::error::{FidError, FidResult};
use crate::extractor::{ExtractorSpec, FeatureExtractor};

/// Accumulate statistics over every batch of `batches` with a probed extractor
pub fn calculate_activation_statistics<I, E>(
    batches: I,
    extractor: &FeatureExtractor,
    normalization: CovarianceNormalization,
) -> FidResult<ActivationStatistics>
where
    I: IntoIterator<Item = Result<SampleBatch, E>>,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    let mut aggregator = StatsAggregator::new(extractor.dims()).with_normalization(normalization);
    let mut offset = 0;

    for (index, batch) in batches.into_iter().enumerate() {
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                aggregator.abort();
                return Err(FidError::source(e));
            }
        };

        let meta = BatchMeta::new(index, offset, batch.len());
        let features = match extractor.extract(&batch, &meta) {
            Ok(features) => features,
            Err(e) => {
                aggregator.abort();
                return Err(e);
            }
        };
        aggregator.update(features.view())?;

        offset += batch.len();
        debug!(batch = index, samples = offset, "Processed batch");
    }

    let stats = aggregator.finalize()?;
    info!(
        samples = stats.count,
        batches = aggregator.batches(),
        dims = stats.dims(),
        "Activation statistics complete"
    );
    Ok(stats)
}

/// Probe the extractor on the first sample of the first batch, then run
///
/// An empty source fails with [`FidError::InsufficientSamples`].
pub fn compute_activation_statistics<I, E>(
    batches: I,
    spec: ExtractorSpec,
    config: &RunConfig,
) -> FidResult<ActivationStatistics>
where
    I: IntoIterator<Item = Result<SampleBatch, E>>,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    config.validate()?;

    let mut batches = batches.into_iter();
    let first = match batches.next() {
        Some(batch) => batch.map_err(FidError::source)?,
        None => return Err(FidError::InsufficientSamples { count: 0 }),
    };

    let extractor = FeatureExtractor::new(spec, config.device, first.probe())?;
    info!(extractor = extractor.name(), dims = extractor.dims(), "Feature map dims");

    calculate_activation_statistics(
        iter::once(Ok(first)).chain(batches),
        &extractor,
        config.covariance,
    )
}
