//! Fixture files for fidstats-io integration tests

#![allow(dead_code)]

use npyz::npz::NpzWriter;
use npyz::{AutoSerialize, WriterBuilder};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Write `label,v0,v1,...` rows with a header line
pub fn write_csv(dir: &Path, name: &str, rows: &[(i64, Vec<f32>)]) -> PathBuf {
    let path = dir.join(name);
    let width = rows.first().map(|(_, v)| v.len()).unwrap_or(0);
    let mut text = String::from("label");
    for i in 0..width {
        text.push_str(&format!(",v{}", i));
    }
    text.push('\n');
    for (label, values) in rows {
        text.push_str(&label.to_string());
        for v in values {
            text.push_str(&format!(",{}", v));
        }
        text.push('\n');
    }
    std::fs::write(&path, text).unwrap();
    path
}

/// Add one array to an open archive
pub fn add_array<T: AutoSerialize>(
    npz: &mut NpzWriter<BufWriter<File>>,
    name: &str,
    shape: &[u64],
    values: Vec<T>,
) {
    let mut writer = npz
        .array(name, Default::default())
        .unwrap()
        .default_dtype()
        .shape(shape)
        .begin_nd()
        .unwrap();
    writer.extend(values).unwrap();
    writer.finish().unwrap();
}

/// Small labelled dataset: two flattened 2x2 "images" per class
pub fn digit_samples() -> Vec<(i64, Vec<f32>)> {
    vec![
        (3, vec![0.0, 1.0, 2.0, 3.0]),
        (0, vec![4.0, 4.0, 1.0, 0.0]),
        (7, vec![9.0, 9.0, 9.0, 9.0]),
        (3, vec![1.0, 3.0, 0.0, 2.0]),
        (0, vec![2.0, 0.0, 5.0, 1.0]),
        (7, vec![8.0, 7.0, 6.0, 5.0]),
    ]
}

/// Two-pass mean and unbiased covariance of `rows`
pub fn reference_stats(rows: &[Vec<f32>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = rows.len() as f64;
    let d = rows[0].len();
    let mut mean = vec![0.0; d];
    for row in rows {
        for (m, &v) in mean.iter_mut().zip(row) {
            *m += v as f64 / n;
        }
    }
    let mut cov = vec![vec![0.0; d]; d];
    for row in rows {
        for i in 0..d {
            for j in 0..d {
                cov[i][j] += (row[i] as f64 - mean[i]) * (row[j] as f64 - mean[j]) / (n - 1.0);
            }
        }
    }
    (mean, cov)
}
