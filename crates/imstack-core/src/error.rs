use std::path::PathBuf;

use thiserror::Error;

use crate::frame::ImageShape;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not find any image files in {} with extension: {extension}", path.display())]
    NotFound { path: PathBuf, extension: String },

    #[error("Could not decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error(
        "An image has different width and/or height dimensions! All images must have the same \
         dimensions. Expected {expected}, got {actual} in {}",
        path.display()
    )]
    ShapeMismatch {
        path: PathBuf,
        expected: ImageShape,
        actual: ImageShape,
    },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not allocate a stack of shape {shape:?}: {reason}")]
    AllocationFailure { shape: [usize; 3], reason: String },

    #[error("Could not load file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Image stack is empty")]
    EmptyStack,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
