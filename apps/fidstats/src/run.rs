//! Dataset -> loader -> extractor -> statistics -> `.npz`

use fidstats_core::{compute_activation_statistics, ExtractorSpec, Flatten, Prefetch, StatsSink};
use fidstats_io::{
    load_mlp_classifier, open_dataset, stats_name, BatchLoader, BinaryDataset, BoxedReader,
    NpzStatsSink, SampleReader,
};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

use crate::config::{ExtractorConfig, JobConfig};

/// Run one job and return the path of the saved statistics
pub fn run(config: &JobConfig) -> Result<PathBuf, Box<dyn Error>> {
    config.validate()?;

    let reader = open_dataset(&config.dataset.path, &config.dataset_options())?;
    info!(
        path = %config.dataset.path,
        format = reader.format_name(),
        samples = reader.len(),
        sample_shape = ?reader.sample_shape(),
        "Opened dataset"
    );

    let reader: BoxedReader = match config.binary() {
        Some((pos, neg)) => {
            let binary = BinaryDataset::new(reader, pos, neg)?;
            info!(pos, neg, samples = binary.len(), "Binary subset");
            Box::new(binary)
        }
        None => reader,
    };

    let spec = match &config.extractor {
        ExtractorConfig::Pixels => ExtractorSpec::feature_maps(Flatten),
        ExtractorConfig::Mlp { weights } => {
            ExtractorSpec::classifier(load_mlp_classifier(weights)?)
        }
    };
    let model = spec.name().to_string();

    let loader = BatchLoader::new(reader, config.run.batch_size)?;
    info!(batches = loader.num_batches(), batch_size = config.run.batch_size, "Batching");

    let stats = if config.run.num_workers > 0 {
        let batches = Prefetch::new(loader, config.run.prefetch_depth());
        compute_activation_statistics(batches, spec, &config.run)?
    } else {
        compute_activation_statistics(loader, spec, &config.run)?
    };

    let dataset = config.dataset_name();
    let name = stats_name(&model, &dataset, config.output.name.as_deref(), config.binary());
    let mut sink = NpzStatsSink::new(&config.output.dir, name, model, dataset)
        .with_normalization(config.run.covariance);
    sink.persist(&stats)?;

    Ok(sink.stats_path())
}
