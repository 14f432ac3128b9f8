//! NPZ archives: sample datasets, statistics files, classifier weights
//!
//! Sample datasets hold `x` (N, ...) and optionally `y` (N). Statistics files
//! hold `mu` (D) and `sigma` (D, D). Classifier weights hold `hidden.weight`,
//! `hidden.bias`, `head.weight` and `head.bias`.

use fidstats_core::{ActivationStatistics, MlpClassifier};
use ndarray::{Array1, Array2};
use npyz::npz::{NpzArchive, NpzWriter};
use npyz::WriterBuilder;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

use crate::naming::model_name_from_path;
use crate::reader::{DatasetOptions, IoError, IoResult};
use crate::schema::SampleTable;
use crate::sink::StatsManifest;

type Archive = NpzArchive<BufReader<File>>;

/// NPZ sample reader
pub struct NpzReader;

impl NpzReader {
    /// Load `x` (and `y` when present) into a sample table
    pub fn open(path: &str, options: &DatasetOptions) -> IoResult<SampleTable> {
        options.validate()?;
        let mut archive = open_archive(Path::new(path))?;

        let (shape, mut values) = read_f32(&mut archive, "x")?;
        if shape.is_empty() {
            return Err(IoError::ShapeMismatch {
                expected: "(N, ...)".to_string(),
                actual: "scalar".to_string(),
            });
        }
        if options.scale != 1.0 {
            values.iter_mut().for_each(|v| *v *= options.scale);
        }

        let rows = shape[0];
        let stored_shape = shape[1..].to_vec();
        let width: usize = stored_shape.iter().product();
        let sample_shape = options.sample_shape.clone().unwrap_or(stored_shape);
        let data = Array2::from_shape_vec((rows, width), values)
            .map_err(|e| IoError::InvalidFormat(e.to_string()))?;

        let labels = match read_i64(&mut archive, "y") {
            Ok((_, labels)) => Some(labels),
            Err(IoError::MissingArray(_)) => None,
            Err(e) => return Err(e),
        };

        let labelled = labels.is_some();
        info!(path, samples = rows, labelled, "Loaded NPZ dataset");

        Ok(SampleTable::new(data, sample_shape, labels)?
            .with_source(path, "NPZ")
            .with_metadata("labelled", labelled.to_string()))
    }
}

/// Read `mu` and `sigma` from a statistics file
///
/// The sample count comes from the sibling `.json` manifest when there is
/// one, and is 0 otherwise.
pub fn load_statistics(path: &Path) -> IoResult<ActivationStatistics> {
    let mut archive = open_archive(path)?;
    let mean = Array1::from(read_f64(&mut archive, "mu")?.1);

    let (shape, sigma) = read_f64(&mut archive, "sigma")?;
    let dims = mean.len();
    if shape != [dims, dims] {
        return Err(IoError::ShapeMismatch {
            expected: format!("sigma of shape [{}, {}]", dims, dims),
            actual: format!("{:?}", shape),
        });
    }
    let covariance = Array2::from_shape_vec((dims, dims), sigma)
        .map_err(|e| IoError::InvalidFormat(e.to_string()))?;

    let manifest_path = path.with_extension("json");
    let count = if manifest_path.exists() {
        let text = std::fs::read_to_string(&manifest_path)?;
        serde_json::from_str::<StatsManifest>(&text)
            .map_err(|e| IoError::InvalidFormat(e.to_string()))?
            .count
    } else {
        0
    };

    Ok(ActivationStatistics {
        mean,
        covariance,
        count,
    })
}

/// Write `mu` and `sigma` as `f64` arrays
pub(crate) fn write_statistics(path: &Path, stats: &ActivationStatistics) -> IoResult<()> {
    let dims = stats.dims() as u64;
    let mut npz = NpzWriter::create(path).map_err(npz_error)?;
    write_f64(&mut npz, "mu", &[dims], stats.mean.iter().copied())?;
    write_f64(&mut npz, "sigma", &[dims, dims], stats.covariance.iter().copied())?;
    Ok(())
}

/// Load an [`MlpClassifier`] from named weight arrays
pub fn load_mlp_classifier(path: &Path) -> IoResult<MlpClassifier> {
    let mut archive = open_archive(path)?;
    let hidden_weight = read_matrix(&mut archive, "hidden.weight")?;
    let hidden_bias = Array1::from(read_f32(&mut archive, "hidden.bias")?.1);
    let head_weight = read_matrix(&mut archive, "head.weight")?;
    let head_bias = Array1::from(read_f32(&mut archive, "head.bias")?.1);

    MlpClassifier::new(
        model_name_from_path(path),
        hidden_weight,
        hidden_bias,
        head_weight,
        head_bias,
    )
    .map_err(|e| IoError::InvalidFormat(e.to_string()))
}

fn open_archive(path: &Path) -> IoResult<Archive> {
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }
    NpzArchive::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))
}

fn npz_error(err: impl std::fmt::Display) -> IoError {
    IoError::Io(err.to_string())
}

fn read_array<T: npyz::Deserialize>(
    archive: &mut Archive,
    name: &str,
) -> IoResult<(Vec<usize>, Vec<T>)> {
    let npy = archive
        .by_name(name)
        .map_err(npz_error)?
        .ok_or_else(|| IoError::MissingArray(name.to_string()))?;
    let shape = npy.shape().iter().map(|&d| d as usize).collect();
    let values = npy.into_vec::<T>().map_err(npz_error)?;
    Ok((shape, values))
}

/// Read an array stored as `f4`, `f8` or `u1`
fn read_f32(archive: &mut Archive, name: &str) -> IoResult<(Vec<usize>, Vec<f32>)> {
    if let Ok(found) = read_array::<f32>(archive, name) {
        return Ok(found);
    }
    if let Ok((shape, values)) = read_array::<f64>(archive, name) {
        return Ok((shape, values.into_iter().map(|v| v as f32).collect()));
    }
    let (shape, values) = read_array::<u8>(archive, name)?;
    Ok((shape, values.into_iter().map(f32::from).collect()))
}

/// Read an array stored as `f8` or `f4`
fn read_f64(archive: &mut Archive, name: &str) -> IoResult<(Vec<usize>, Vec<f64>)> {
    if let Ok(found) = read_array::<f64>(archive, name) {
        return Ok(found);
    }
    let (shape, values) = read_array::<f32>(archive, name)?;
    Ok((shape, values.into_iter().map(f64::from).collect()))
}

/// Read an integer array stored as `i8`, `i4` or `u1`
fn read_i64(archive: &mut Archive, name: &str) -> IoResult<(Vec<usize>, Vec<i64>)> {
    if let Ok(found) = read_array::<i64>(archive, name) {
        return Ok(found);
    }
    if let Ok((shape, values)) = read_array::<i32>(archive, name) {
        return Ok((shape, values.into_iter().map(i64::from).collect()));
    }
    let (shape, values) = read_array::<u8>(archive, name)?;
    Ok((shape, values.into_iter().map(i64::from).collect()))
}

fn read_matrix(archive: &mut Archive, name: &str) -> IoResult<Array2<f32>> {
    let (shape, values) = read_f32(archive, name)?;
    match shape.as_slice() {
        &[rows, cols] => Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| IoError::InvalidFormat(e.to_string())),
        other => Err(IoError::ShapeMismatch {
            expected: format!("2-D array for {}", name),
            actual: format!("{:?}", other),
        }),
    }
}

fn write_f64(
    npz: &mut NpzWriter<BufWriter<File>>,
    name: &str,
    shape: &[u64],
    values: impl IntoIterator<Item = f64>,
) -> IoResult<()> {
    let mut writer = npz
        .array(name, Default::default())
        .map_err(npz_error)?
        .default_dtype()
        .shape(shape)
        .begin_nd()
        .map_err(npz_error)?;
    writer.extend(values).map_err(npz_error)?;
    writer.finish().map_err(npz_error)?;
    Ok(())
}
