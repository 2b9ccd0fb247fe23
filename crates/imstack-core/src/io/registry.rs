use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{LoadError, Result};
use crate::frame::{ImageFormat, ImageShape};
use crate::io::fits::FitsDecoder;
use crate::io::image_io::TiffDecoder;
use crate::io::pixels::{DecodedImage, PixelData};
use crate::io::ser::SerDecoder;

/// A multi-frame source whose frames can be read independently.
///
/// Implementations keep the file open (memory-mapped or a library handle)
/// and decode a frame only when asked, so workers can pull disjoint frames
/// concurrently.
pub trait FrameSource: Send + Sync {
    fn frame_count(&self) -> usize;

    /// Shape of a single frame.
    fn frame_shape(&self) -> ImageShape;

    /// Decode one frame as a (1, height, width) array.
    fn frame(&self, index: usize) -> Result<PixelData>;
}

/// A one-file-per-frame image format (files may also hold a whole stack).
pub trait ImageDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shape from the header only, without decoding pixel data.
    fn probe(&self, path: &Path) -> Result<ImageShape>;

    /// Decode the whole file, pixel values unaltered.
    fn decode(&self, path: &Path) -> Result<DecodedImage>;

    /// Open a file holding a stack without materializing its frames.
    fn open_stack(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    /// Find out whether `path` holds one image or a stack. A stack comes
    /// back already open so it is read through that one handle.
    fn inspect(&self, path: &Path) -> Result<FileContents> {
        match self.probe(path)? {
            shape @ ImageShape::Single { .. } => Ok(FileContents::Single(shape)),
            ImageShape::Stack { .. } => Ok(FileContents::Stack(self.open_stack(path)?)),
        }
    }
}

/// What a sample file turned out to hold.
pub enum FileContents {
    Single(ImageShape),
    Stack(Box<dyn FrameSource>),
}

/// A container format holding sample, flat and dark frames in one file.
pub trait ContainerDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
}

/// How a format is ingested by the loader.
#[derive(Clone)]
pub enum Ingestion {
    PerFile(Arc<dyn ImageDecoder>),
    Container(Arc<dyn ContainerDecoder>),
}

/// Maps format tokens to decoders. Built once and passed to the loader.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    entries: BTreeMap<&'static str, (ImageFormat, Ingestion)>,
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every decoder this build supports.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        let fits: Arc<dyn ImageDecoder> = Arc::new(FitsDecoder);
        registry.register_image(ImageFormat::Fits, fits.clone());
        registry.register_image(ImageFormat::Fit, fits);

        let tiff: Arc<dyn ImageDecoder> = Arc::new(TiffDecoder);
        registry.register_image(ImageFormat::Tif, tiff.clone());
        registry.register_image(ImageFormat::Tiff, tiff);

        registry.register_image(ImageFormat::Ser, Arc::new(SerDecoder));

        #[cfg(feature = "nexus")]
        registry.register_container(ImageFormat::Nxs, Arc::new(crate::io::nexus::NexusDecoder));

        registry
    }

    pub fn register_image(&mut self, format: ImageFormat, decoder: Arc<dyn ImageDecoder>) {
        self.entries
            .insert(format.extension(), (format, Ingestion::PerFile(decoder)));
    }

    pub fn register_container(&mut self, format: ImageFormat, decoder: Arc<dyn ContainerDecoder>) {
        self.entries
            .insert(format.extension(), (format, Ingestion::Container(decoder)));
    }

    pub fn supports(&self, format: ImageFormat) -> bool {
        self.entries.contains_key(format.extension())
    }

    /// Registered format tokens, sorted.
    pub fn supported_formats(&self) -> Vec<ImageFormat> {
        self.entries.values().map(|(f, _)| *f).collect()
    }

    pub fn ingestion(&self, format: ImageFormat) -> Result<&Ingestion> {
        self.entries
            .get(format.extension())
            .map(|(_, ingestion)| ingestion)
            .ok_or_else(|| LoadError::UnsupportedFormat(format.to_string()))
    }

    /// Decoder for single-image reads; container formats have none.
    pub fn image_decoder(&self, format: ImageFormat) -> Result<&Arc<dyn ImageDecoder>> {
        match self.ingestion(format)? {
            Ingestion::PerFile(decoder) => Ok(decoder),
            Ingestion::Container(_) => Err(LoadError::UnsupportedFormat(format!(
                "{format} supports whole-stack reads only"
            ))),
        }
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.keys())
            .finish()
    }
}

/// Frames already decoded into memory.
pub struct InMemoryFrames {
    pixels: PixelData,
}

impl InMemoryFrames {
    pub fn new(pixels: PixelData) -> Self {
        Self { pixels }
    }
}

impl FrameSource for InMemoryFrames {
    fn frame_count(&self) -> usize {
        self.pixels.dim().0
    }

    fn frame_shape(&self) -> ImageShape {
        let (_, height, width) = self.pixels.dim();
        ImageShape::Single { height, width }
    }

    fn frame(&self, index: usize) -> Result<PixelData> {
        let total = self.frame_count();
        if index >= total {
            return Err(LoadError::FrameIndexOutOfRange { index, total });
        }
        Ok(self.pixels.frame(index))
    }
}
