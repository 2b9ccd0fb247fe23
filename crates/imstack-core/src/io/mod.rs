pub mod enumerate;
pub mod fits;
pub mod image_io;
#[cfg(feature = "nexus")]
pub mod nexus;
pub mod pixels;
pub mod registry;
pub mod ser;

use std::path::Path;

use crate::error::Result;
use crate::frame::ImageFormat;
use pixels::DecodedImage;
use registry::DecoderRegistry;

/// Read one image file with the decoder registered for `format`.
pub fn imread(registry: &DecoderRegistry, path: &Path, format: ImageFormat) -> Result<DecodedImage> {
    registry.image_decoder(format)?.decode(path)
}
