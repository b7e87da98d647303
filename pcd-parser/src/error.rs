use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no `{table}` record with token {token}")]
    MissingRecord { table: &'static str, token: String },
    #[error("sample {0} has no LIDAR_TOP sample_data")]
    MissingLidar(String),
    #[error("{path:?}: {len} bytes is not a whole number of {record_size}-byte point records")]
    MalformedPointFile {
        path: PathBuf,
        len: usize,
        record_size: usize,
    },
    #[error("category `{0}` has no lidarseg index")]
    UnknownCategory(String),
}
