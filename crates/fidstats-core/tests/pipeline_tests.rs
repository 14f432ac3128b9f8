//! End-to-end runs: batch source -> extractor -> aggregator -> sink

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{max_rel_diff, two_pass, uniform_rows, SimpleRng};
use fidstats_core::{
    calculate_activation_statistics, compute_activation_statistics, BatchMeta,
    CovarianceNormalization, Device, ExtractorSpec, FeatureExtractor, FeatureMapModel, FidError,
    Flatten, InMemoryBatches, MemorySink, MlpClassifier, ModelError, Prefetch, RunConfig,
    StatsSink,
};
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis, IxDyn};

fn pixels() -> ExtractorSpec {
    ExtractorSpec::feature_maps(Flatten)
}

fn images(n: usize, seed: u64) -> ArrayD<f32> {
    let mut rng = SimpleRng::new(seed);
    ArrayD::from_shape_fn(IxDyn(&[n, 1, 3, 3]), |_| rng.next_f64() as f32)
}

/// Flattens like [`Flatten`] and records every batch it sees
struct Recording {
    seen: Rc<RefCell<Vec<BatchMeta>>>,
}

impl FeatureMapModel for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    fn feature_maps(
        &self,
        batch: ArrayViewD<'_, f32>,
        meta: &BatchMeta,
    ) -> Result<Array2<f32>, ModelError> {
        self.seen.borrow_mut().push(*meta);
        Flatten.feature_maps(batch, meta)
    }
}

#[test]
fn test_pixels_match_two_pass() {
    let data = images(50, 9);
    let flat: Array2<f64> = data
        .view()
        .into_shape_with_order((50, 9))
        .unwrap()
        .mapv(f64::from);
    let (mean, cov) = two_pass(&flat);

    let config = RunConfig {
        batch_size: 16,
        ..RunConfig::default()
    };
    let batches = InMemoryBatches::new(data, config.batch_size).unwrap();
    let stats = compute_activation_statistics(batches, pixels(), &config).unwrap();

    assert_eq!(stats.count, 50);
    assert!(max_rel_diff(stats.mean.iter(), mean.iter()) < 1e-6);
    assert!(max_rel_diff(stats.covariance.iter(), cov.iter()) < 1e-6);
}

#[test]
fn test_batch_meta_offsets() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let model = Recording { seen: seen.clone() };
    let batches = InMemoryBatches::new(images(10, 1), 4).unwrap();

    let spec = ExtractorSpec::feature_maps(model);
    compute_activation_statistics(batches, spec, &RunConfig::default()).unwrap();

    // Probe first, then every batch in order
    let seen = seen.borrow();
    assert_eq!(
        *seen,
        vec![
            BatchMeta::probe(),
            BatchMeta::new(0, 0, 4),
            BatchMeta::new(1, 4, 4),
            BatchMeta::new(2, 8, 2),
        ]
    );
}

#[test]
fn test_classifier_feature_maps() {
    let mut rng = SimpleRng::new(4);
    let hidden_weight = uniform_rows(&mut rng, 5, 9, 1.0).mapv(|v| v as f32);
    let head_weight = uniform_rows(&mut rng, 2, 5, 1.0).mapv(|v| v as f32);
    let mlp = MlpClassifier::new(
        "classifier",
        hidden_weight,
        Array1::from_elem(5, 0.1),
        head_weight,
        Array1::zeros(2),
    )
    .unwrap();

    let batches = InMemoryBatches::new(images(40, 2), 7).unwrap();
    let spec = ExtractorSpec::classifier(mlp);
    let stats = compute_activation_statistics(batches, spec, &RunConfig::default()).unwrap();

    assert_eq!(stats.dims(), 5);
    assert_eq!(stats.count, 40);
    // ReLU features are never negative
    assert!(stats.mean.iter().all(|&m| m >= 0.0));
}

#[test]
fn test_prefetch_matches_direct() {
    let data = images(33, 5);
    let probe = data.index_axis(Axis(0), 0).insert_axis(Axis(0)).to_owned();
    let extractor = FeatureExtractor::new(pixels(), Device::Cpu, probe.view()).unwrap();

    let direct = calculate_activation_statistics(
        InMemoryBatches::new(data.clone(), 8).unwrap(),
        &extractor,
        CovarianceNormalization::Unbiased,
    )
    .unwrap();
    let prefetched = calculate_activation_statistics(
        Prefetch::new(InMemoryBatches::new(data, 8).unwrap(), 4),
        &extractor,
        CovarianceNormalization::Unbiased,
    )
    .unwrap();

    assert_eq!(direct, prefetched);
}

#[test]
fn test_failed_run_leaves_sink_empty() {
    let batches: Vec<Result<_, std::io::Error>> = vec![
        Ok(fidstats_core::SampleBatch::new(images(4, 1)).unwrap()),
        Err(std::io::Error::new(std::io::ErrorKind::Other, "loader crashed")),
    ];
    let mut sink = MemorySink::new();

    let result = compute_activation_statistics(batches, pixels(), &RunConfig::default());
    if let Ok(stats) = &result {
        sink.persist(stats).unwrap();
    }

    assert!(matches!(result, Err(FidError::Source(_))));
    assert!(sink.get().is_none());
}

#[test]
fn test_successful_run_reaches_sink() {
    let batches = InMemoryBatches::new(images(12, 3), 5).unwrap();
    let stats = compute_activation_statistics(batches, pixels(), &RunConfig::default()).unwrap();

    let mut sink = MemorySink::new();
    sink.persist(&stats).unwrap();
    let stored = sink.into_inner().unwrap();
    assert_eq!(stored.mean.len(), 9);
    assert_eq!(stored.covariance.shape(), &[9, 9]);
}

#[test]
fn test_accelerator_rejected_for_cpu_models() {
    let batches = InMemoryBatches::new(images(4, 1), 2).unwrap();
    let config = RunConfig {
        device: Device::Cuda(0),
        ..RunConfig::default()
    };
    let err = compute_activation_statistics(batches, pixels(), &config).unwrap_err();
    assert!(matches!(err, FidError::ExtractorInitialization(_)));
}
