//! `.npz` statistics sink
//!
//! Writes `<dir>/<name>.npz` with `mu` and `sigma`, and `<dir>/<name>.json`
//! describing the run. Both files go to hidden temporaries first and are
//! renamed into place only once both are complete.

use chrono::{DateTime, Utc};
use fidstats_core::{ActivationStatistics, CovarianceNormalization, StatsSink};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::naming::stats_file_path;
use crate::npz::write_statistics;
use crate::reader::{IoError, IoResult};

/// Run description stored next to a statistics file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsManifest {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub count: u64,
    pub dims: usize,
    pub extractor: String,
    pub dataset: String,
    pub normalization: CovarianceNormalization,
}

/// Persists statistics as `.npz` plus a JSON manifest
#[derive(Debug, Clone)]
pub struct NpzStatsSink {
    dir: PathBuf,
    name: String,
    extractor: String,
    dataset: String,
    normalization: CovarianceNormalization,
}

impl NpzStatsSink {
    pub fn new(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        extractor: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            extractor: extractor.into(),
            dataset: dataset.into(),
            normalization: CovarianceNormalization::default(),
        }
    }

    /// Normalization recorded in the manifest
    pub fn with_normalization(mut self, normalization: CovarianceNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn stats_path(&self) -> PathBuf {
        stats_file_path(&self.dir, &self.name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    fn temp_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!(".{}.{}.tmp", self.name, extension))
    }

    fn manifest(&self, stats: &ActivationStatistics) -> StatsManifest {
        StatsManifest {
            name: self.name.clone(),
            created_at: Utc::now(),
            count: stats.count,
            dims: stats.dims(),
            extractor: self.extractor.clone(),
            dataset: self.dataset.clone(),
            normalization: self.normalization,
        }
    }

    fn write_temporaries(
        &self,
        stats: &ActivationStatistics,
        stats_tmp: &Path,
        manifest_tmp: &Path,
    ) -> IoResult<()> {
        write_statistics(stats_tmp, stats)?;
        let json = serde_json::to_string_pretty(&self.manifest(stats))
            .map_err(|e| IoError::InvalidFormat(e.to_string()))?;
        fs::write(manifest_tmp, json)?;
        Ok(())
    }

    /// Move both temporaries into place, or neither
    fn commit(&self, stats_tmp: &Path, manifest_tmp: &Path) -> IoResult<()> {
        let stats_path = self.stats_path();
        fs::rename(stats_tmp, &stats_path)?;
        if let Err(e) = fs::rename(manifest_tmp, self.manifest_path()) {
            if fs::remove_file(&stats_path).is_err() {
                warn!(path = %stats_path.display(), "Could not remove statistics file");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

impl StatsSink for NpzStatsSink {
    type Error = IoError;

    fn persist(&mut self, stats: &ActivationStatistics) -> IoResult<()> {
        fs::create_dir_all(&self.dir)?;

        let stats_tmp = self.temp_path("npz");
        let manifest_tmp = self.temp_path("json");
        let written = self
            .write_temporaries(stats, &stats_tmp, &manifest_tmp)
            .and_then(|()| self.commit(&stats_tmp, &manifest_tmp));

        if let Err(e) = written {
            for tmp in [&stats_tmp, &manifest_tmp] {
                if tmp.exists() && fs::remove_file(tmp).is_err() {
                    warn!(path = %tmp.display(), "Could not remove temporary file");
                }
            }
            return Err(e);
        }

        info!(path = %self.stats_path().display(), "Saved statistics");
        Ok(())
    }
}
