use std::{fs, path::Path};

use crate::error::DatasetError;

/// Lidarseg ground truth: one `u8` class index per point of the matching sweep.
pub fn read_lidarseg_labels(path: &Path) -> Result<Vec<u8>, DatasetError> {
    fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}
