//! Statistics file naming
//!
//! `stats.<model>.<dataset>` by default, an explicit name otherwise, with
//! `.<pos>v<neg>` appended for binary tasks.

use std::path::{Path, PathBuf};

/// Name of a statistics file, without extension
pub fn stats_name(
    model: &str,
    dataset: &str,
    explicit: Option<&str>,
    binary: Option<(i64, i64)>,
) -> String {
    let base = match explicit {
        Some(name) => name.to_string(),
        None => format!("stats.{}.{}", model, dataset),
    };
    match binary {
        Some((pos, neg)) => format!("{}.{}v{}", base, pos, neg),
        None => base,
    }
}

/// Model name of a weights file: its file name minus the last extension
pub fn model_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    }
}

/// `<dir>/<name>.npz`
pub fn stats_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.npz", name))
}
