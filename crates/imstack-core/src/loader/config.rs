use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_WORKER_COUNT;
use crate::error::{LoadError, Result};
use crate::frame::{DType, ImageFormat};
use crate::io::registry::DecoderRegistry;
use crate::stack::ParallelOptions;

/// What to load and how. Flat and dark stacks are optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Directory (or one file inside it) holding the sample images.
    pub sample_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_path: Option<PathBuf>,
    pub format: ImageFormat,
    #[serde(default)]
    pub output_dtype: DType,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Rows per task on the parallel copy path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

impl LoaderConfig {
    pub fn new(sample_path: impl Into<PathBuf>, format: ImageFormat) -> Self {
        Self {
            sample_path: sample_path.into(),
            flat_path: None,
            dark_path: None,
            format,
            output_dtype: DType::default(),
            worker_count: DEFAULT_WORKER_COUNT,
            chunk_size: None,
        }
    }

    pub fn with_flat(mut self, path: impl Into<PathBuf>) -> Self {
        self.flat_path = Some(path.into());
        self
    }

    pub fn with_dark(mut self, path: impl Into<PathBuf>) -> Self {
        self.dark_path = Some(path.into());
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.output_dtype = dtype;
        self
    }

    pub fn with_workers(mut self, workers: usize, chunk_size: Option<usize>) -> Self {
        self.worker_count = workers;
        self.chunk_size = chunk_size;
        self
    }

    /// Check the configuration once, before any file is touched.
    pub fn validate(&self, registry: &DecoderRegistry) -> Result<()> {
        if self.worker_count == 0 {
            return Err(LoadError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.chunk_size == Some(0) {
            return Err(LoadError::InvalidConfig(
                "chunk_size must be at least 1".into(),
            ));
        }
        if self.sample_path.as_os_str().is_empty() {
            return Err(LoadError::InvalidConfig("sample_path is empty".into()));
        }
        if !registry.supports(self.format) {
            return Err(LoadError::UnsupportedFormat(self.format.to_string()));
        }
        Ok(())
    }

    pub fn parallel_options(&self) -> ParallelOptions {
        ParallelOptions {
            workers: self.worker_count,
            chunk_size: self.chunk_size,
        }
    }

    pub fn flat_path(&self) -> Option<&Path> {
        self.flat_path.as_deref()
    }

    pub fn dark_path(&self) -> Option<&Path> {
        self.dark_path.as_deref()
    }
}
