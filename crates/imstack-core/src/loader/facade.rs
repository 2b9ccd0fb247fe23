use std::path::Path;

use ndarray::Axis;
use tracing::{debug, info, warn};

use crate::consts::{
    DARK_LABEL, FLAT_LABEL, NEXUS_REFERENCE_FRAMES, SAMPLE_LABEL, SAMPLE_PARALLEL_LABEL,
};
use crate::error::{LoadError, Result};
use crate::frame::{DType, ImageShape, ImageStack, LoadResult, Pixel, ReferenceFrame};
use crate::io::enumerate::get_file_names;
use crate::io::registry::{
    ContainerDecoder, DecoderRegistry, FileContents, FrameSource, ImageDecoder, Ingestion,
};
use crate::progress::ProgressSink;
use crate::stack::{mean_frame, populate_files, populate_from_source};

use super::config::LoaderConfig;

/// Loads a sample stack plus averaged flat and dark frames.
///
/// The registry and progress sink are borrowed for the loader's lifetime;
/// nothing is looked up from global state.
pub struct Loader<'a> {
    registry: &'a DecoderRegistry,
    progress: &'a dyn ProgressSink,
}

impl<'a> Loader<'a> {
    pub fn new(registry: &'a DecoderRegistry, progress: &'a dyn ProgressSink) -> Self {
        Self { registry, progress }
    }

    /// Load into a stack of `T`. `config.output_dtype` is not consulted;
    /// use [`Loader::load_dynamic`] to dispatch on it.
    ///
    /// Nothing partial is returned: any failure drops the buffers built so far.
    pub fn load<T: Pixel>(&self, config: &LoaderConfig) -> Result<LoadResult<T>> {
        config.validate(self.registry)?;

        let result = match self.registry.ingestion(config.format)? {
            Ingestion::PerFile(decoder) => self.load_per_file::<T>(&**decoder, config)?,
            Ingestion::Container(decoder) => self.load_container::<T>(&**decoder, config)?,
        };

        check_data_stack(&result.sample)?;
        info!(
            shape = %result.sample_shape(),
            dtype = %T::DTYPE,
            flat = result.flat.is_some(),
            dark = result.dark.is_some(),
            "Stack loaded"
        );
        Ok(result)
    }

    /// Load using the element type named by `config.output_dtype`.
    pub fn load_dynamic(&self, config: &LoaderConfig) -> Result<LoadedStack> {
        Ok(match config.output_dtype {
            DType::Uint8 => LoadedStack::Uint8(self.load(config)?),
            DType::Uint16 => LoadedStack::Uint16(self.load(config)?),
            DType::Int16 => LoadedStack::Int16(self.load(config)?),
            DType::Int32 => LoadedStack::Int32(self.load(config)?),
            DType::Float32 => LoadedStack::Float32(self.load(config)?),
            DType::Float64 => LoadedStack::Float64(self.load(config)?),
        })
    }

    fn load_per_file<T: Pixel>(
        &self,
        decoder: &dyn ImageDecoder,
        config: &LoaderConfig,
    ) -> Result<LoadResult<T>> {
        let extension = config.format.extension();
        let files = get_file_names(&config.sample_path, extension)?;

        // All images are assumed to share the first one's shape; the
        // populator enforces it.
        let first = &files[0];
        let (frame_shape, sample) = match decoder.inspect(first)? {
            FileContents::Single(shape) => {
                info!(
                    files = files.len(),
                    shape = %shape,
                    decoder = decoder.name(),
                    "Loading sample images"
                );
                let sample =
                    populate_files::<T>(decoder, &files, shape, self.progress, SAMPLE_LABEL)?;
                (shape, sample)
            }
            FileContents::Stack(source) => {
                if files.len() > 1 {
                    warn!(
                        ignored = files.len() - 1,
                        file = %first.display(),
                        "Sample file is a stack; only the first file is loaded"
                    );
                }
                info!(
                    frames = source.frame_count(),
                    shape = %source.frame_shape(),
                    decoder = decoder.name(),
                    "Loading sample stack"
                );
                let sample = populate_from_source::<T>(
                    source.as_ref(),
                    first,
                    0..source.frame_count(),
                    &config.parallel_options(),
                    self.progress,
                    SAMPLE_PARALLEL_LABEL,
                )?;
                (source.frame_shape(), sample)
            }
        };

        let flat = self.load_and_average::<T>(decoder, config.flat_path(), extension, frame_shape, FLAT_LABEL)?;
        let dark = self.load_and_average::<T>(decoder, config.dark_path(), extension, frame_shape, DARK_LABEL)?;

        Ok(LoadResult { sample, flat, dark })
    }

    /// Absent path means "not configured"; a configured path with no
    /// matching files is a `NotFound` error.
    fn load_and_average<T: Pixel>(
        &self,
        decoder: &dyn ImageDecoder,
        path: Option<&Path>,
        extension: &str,
        frame_shape: ImageShape,
        label: &str,
    ) -> Result<Option<ReferenceFrame>> {
        let Some(path) = path else {
            return Ok(None);
        };
        let files = get_file_names(path, extension)?;
        let data = populate_files::<T>(decoder, &files, frame_shape, self.progress, label)?;
        let average = mean_frame(&data)?;
        debug!(label, files = files.len(), "Reference frame averaged");
        Ok(Some(average))
    }

    /// Sample, flat and dark frames co-located in one container file: every
    /// frame but the last two is sample, then flat, then dark.
    fn load_container<T: Pixel>(
        &self,
        decoder: &dyn ContainerDecoder,
        config: &LoaderConfig,
    ) -> Result<LoadResult<T>> {
        if config.flat_path.is_some() || config.dark_path.is_some() {
            warn!(
                format = %config.format,
                "Flat and dark paths are ignored; references come from the container"
            );
        }

        let files = get_file_names(&config.sample_path, config.format.extension())?;
        let path = &files[0];
        let source = decoder.open(path)?;
        let total = source.frame_count();
        if total < NEXUS_REFERENCE_FRAMES {
            return Err(LoadError::decode(
                path,
                format!("container holds {total} frames, need at least {NEXUS_REFERENCE_FRAMES} reference frames"),
            ));
        }
        info!(
            frames = total,
            file = %path.display(),
            decoder = decoder.name(),
            "Loading container stack"
        );

        let samples = total - NEXUS_REFERENCE_FRAMES;
        let sample = populate_from_source::<T>(
            source.as_ref(),
            path,
            0..samples,
            &config.parallel_options(),
            self.progress,
            SAMPLE_LABEL,
        )?;
        let flat = reference_frame(source.as_ref(), samples)?;
        let dark = reference_frame(source.as_ref(), samples + 1)?;

        Ok(LoadResult {
            sample,
            flat: Some(flat),
            dark: Some(dark),
        })
    }
}

/// One frame of a source taken as-is as a reference frame.
fn reference_frame(source: &dyn FrameSource, index: usize) -> Result<ReferenceFrame> {
    Ok(source
        .frame(index)?
        .to_array::<f64>()
        .index_axis_move(Axis(0), 0))
}

/// The finished sample stack must hold at least one pixel.
fn check_data_stack<T>(sample: &ImageStack<T>) -> Result<()> {
    if sample.is_empty() {
        return Err(LoadError::EmptyStack);
    }
    Ok(())
}

/// A load result whose element type was chosen at runtime.
#[derive(Clone, Debug)]
pub enum LoadedStack {
    Uint8(LoadResult<u8>),
    Uint16(LoadResult<u16>),
    Int16(LoadResult<i16>),
    Int32(LoadResult<i32>),
    Float32(LoadResult<f32>),
    Float64(LoadResult<f64>),
}

macro_rules! each_stack {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            LoadedStack::Uint8($r) => $body,
            LoadedStack::Uint16($r) => $body,
            LoadedStack::Int16($r) => $body,
            LoadedStack::Int32($r) => $body,
            LoadedStack::Float32($r) => $body,
            LoadedStack::Float64($r) => $body,
        }
    };
}

impl LoadedStack {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Uint8(_) => DType::Uint8,
            Self::Uint16(_) => DType::Uint16,
            Self::Int16(_) => DType::Int16,
            Self::Int32(_) => DType::Int32,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
        }
    }

    pub fn sample_shape(&self) -> ImageShape {
        each_stack!(self, r => r.sample_shape())
    }

    pub fn sample_stats(&self) -> Option<crate::stack::Stats> {
        each_stack!(self, r => crate::stack::stats(r.sample.iter()))
    }

    pub fn flat(&self) -> Option<&ReferenceFrame> {
        each_stack!(self, r => r.flat.as_ref())
    }

    pub fn dark(&self) -> Option<&ReferenceFrame> {
        each_stack!(self, r => r.dark.as_ref())
    }

    /// Sample stack widened to float64.
    pub fn sample_f64(&self) -> ImageStack<f64> {
        each_stack!(self, r => r.sample.mapv(|v| v.to_f64()))
    }
}
