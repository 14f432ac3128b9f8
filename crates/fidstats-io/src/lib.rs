//! fidstats-io - Dataset and statistics I/O for fidstats
//!
//! This crate sits around `fidstats-core` and provides:
//!
//! - **Readers**: CSV/TSV and NPZ sample tables behind the `SampleReader` trait
//! - **BatchLoader**: sequential fixed-size batches over any reader
//! - **BinaryDataset**: two-class subset of a labelled dataset
//! - **Naming**: `stats.<model>.<dataset>[.<pos>v<neg>]` file names
//! - **NpzStatsSink**: `mu`/`sigma` `.npz` files plus a JSON manifest, written
//!   all-or-nothing
//!
//! # Design
//!
//! Readers load the sample table eagerly and serve batches by index, so the
//! loader and the binary filter work the same way over every format.

pub mod binary;
pub mod loader;
pub mod naming;
pub mod reader;
pub mod schema;

#[cfg(feature = "csv")]
pub mod csv_reader;

#[cfg(feature = "npz")]
pub mod npz;

#[cfg(feature = "npz")]
pub mod sink;

pub use binary::*;
pub use loader::*;
pub use naming::*;
pub use reader::*;
pub use schema::*;

#[cfg(feature = "npz")]
pub use npz::{load_mlp_classifier, load_statistics, NpzReader};

#[cfg(feature = "npz")]
pub use sink::*;
