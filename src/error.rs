use std::path::PathBuf;

/// Errors surfaced by the model lifecycle. Input-shape problems never reach
/// this type; they are coerced away during extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode model: {0}")]
    Encode(String),

    #[error("failed to decode model: {0}")]
    Decode(String),

    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot fit a model on an empty sample set")]
    EmptyTrainingSet,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
