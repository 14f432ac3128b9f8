//! CSV sample reader
//!
//! One sample per row. An optional label column holds the class; every other
//! column is a numeric sample value.

use ndarray::Array2;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::reader::{DatasetOptions, IoError, IoResult};
use crate::schema::SampleTable;

/// CSV file reader
pub struct CsvReader;

impl CsvReader {
    /// Load a CSV file into a sample table
    pub fn open(path: &str, options: &DatasetOptions) -> IoResult<SampleTable> {
        options.validate()?;
        if !Path::new(path).exists() {
            return Err(IoError::FileNotFound(path.to_string()));
        }

        let file = File::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter as u8)
            .has_headers(options.has_header)
            .from_reader(BufReader::new(file));

        let mut values: Vec<f32> = Vec::new();
        let mut labels: Vec<i64> = Vec::new();
        let mut width: Option<usize> = if options.has_header {
            let headers = reader
                .headers()
                .map_err(|e| IoError::InvalidFormat(e.to_string()))?;
            Some(value_columns(headers.len(), options.label_column)?)
        } else {
            None
        };
        let mut rows = 0;

        for (i, result) in reader.records().enumerate() {
            let line = i + 1 + usize::from(options.has_header);
            let record = result.map_err(|e| IoError::InvalidFormat(e.to_string()))?;
            let row_width = value_columns(record.len(), options.label_column)?;
            match width {
                Some(w) if w != row_width => {
                    return Err(IoError::InvalidFormat(format!(
                        "line {}: expected {} values, got {}",
                        line, w, row_width
                    )));
                }
                _ => width = Some(row_width),
            }

            for (col, field) in record.iter().enumerate() {
                if Some(col) == options.label_column {
                    labels.push(parse_label(field, line)?);
                } else {
                    let value: f32 = field.trim().parse().map_err(|_| {
                        IoError::InvalidFormat(format!(
                            "line {}, column {}: '{}' is not a number",
                            line, col, field
                        ))
                    })?;
                    values.push(value * options.scale);
                }
            }
            rows += 1;
        }

        let width = width.unwrap_or(0);
        let sample_shape = options.sample_shape.clone().unwrap_or_else(|| vec![width]);
        let data = Array2::from_shape_vec((rows, width), values)
            .map_err(|e| IoError::InvalidFormat(e.to_string()))?;
        let labels = options.label_column.map(|_| labels);

        info!(path, samples = rows, values_per_sample = width, "Loaded CSV dataset");

        Ok(SampleTable::new(data, sample_shape, labels)?
            .with_source(path, "CSV")
            .with_metadata("labelled", options.label_column.is_some().to_string()))
    }
}

/// Number of value columns in a row of `columns` fields
fn value_columns(columns: usize, label_column: Option<usize>) -> IoResult<usize> {
    match label_column {
        Some(label) if label >= columns => Err(IoError::InvalidFormat(format!(
            "label column {} out of range for {} columns",
            label, columns
        ))),
        Some(_) => Ok(columns - 1),
        None => Ok(columns),
    }
}

/// Labels may be written as integers or integral floats ("3" or "3.0")
fn parse_label(field: &str, line: usize) -> IoResult<i64> {
    let field = field.trim();
    if let Ok(label) = field.parse::<i64>() {
        return Ok(label);
    }
    match field.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
        _ => Err(IoError::InvalidFormat(format!(
            "line {}: invalid label '{}'",
            line, field
        ))),
    }
}
