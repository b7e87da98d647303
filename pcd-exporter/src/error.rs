use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("point {index}: intensity {value} is outside the 0..=255 encoding")]
    ChannelOutOfRange { index: usize, value: f32 },
}
