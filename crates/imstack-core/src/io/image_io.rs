use std::path::Path;

use image::{DynamicImage, GrayImage, ImageError, ImageFormat, Luma};
use ndarray::Array3;

use crate::error::{LoadError, Result};
use crate::frame::{ImageShape, ReferenceFrame};
use crate::io::pixels::{DecodedImage, PixelData};
use crate::io::registry::{FrameSource, ImageDecoder, InMemoryFrames};

fn image_error(path: &Path, err: ImageError) -> LoadError {
    match err {
        ImageError::IoError(e) => LoadError::io(path, e),
        other => LoadError::decode(path, other.to_string()),
    }
}

/// Decoder for single-channel 8/16-bit TIFF images.
#[derive(Clone, Copy, Debug, Default)]
pub struct TiffDecoder;

impl ImageDecoder for TiffDecoder {
    fn name(&self) -> &'static str {
        "TIFF"
    }

    fn probe(&self, path: &Path) -> Result<ImageShape> {
        let (w, h) = image::image_dimensions(path).map_err(|e| image_error(path, e))?;
        Ok(ImageShape::Single {
            height: h as usize,
            width: w as usize,
        })
    }

    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let img = image::open(path).map_err(|e| image_error(path, e))?;
        let (w, h) = (img.width() as usize, img.height() as usize);
        let shape_err = |e: ndarray::ShapeError| LoadError::decode(path, e.to_string());

        let pixels = match img {
            DynamicImage::ImageLuma8(buf) => {
                PixelData::U8(Array3::from_shape_vec((1, h, w), buf.into_raw()).map_err(shape_err)?)
            }
            DynamicImage::ImageLuma16(buf) => PixelData::U16(
                Array3::from_shape_vec((1, h, w), buf.into_raw()).map_err(shape_err)?,
            ),
            other => {
                return Err(LoadError::decode(
                    path,
                    format!("expected a single-channel image, got {:?}", other.color()),
                ));
            }
        };

        Ok(DecodedImage::new(
            ImageShape::Single {
                height: h,
                width: w,
            },
            pixels,
        ))
    }

    fn open_stack(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(InMemoryFrames::new(self.decode(path)?.pixels)))
    }
}

/// Linear min/max stretch of a reference frame into [0, 1].
fn stretch(frame: &ReferenceFrame) -> impl Iterator<Item = f64> + '_ {
    let (min, max) = frame
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = if max > min { max - min } else { 1.0 };
    let min = if min.is_finite() { min } else { 0.0 };
    frame.iter().map(move |&v| ((v - min) / range).clamp(0.0, 1.0))
}

/// Save a reference frame as a stretched 16-bit grayscale TIFF preview.
pub fn save_tiff(frame: &ReferenceFrame, path: &Path) -> Result<()> {
    let (h, w) = frame.dim();
    let pixels: Vec<u16> = stretch(frame).map(|v| (v * 65535.0) as u16).collect();

    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| LoadError::decode(path, "buffer size does not match dimensions"))?;
    img.save(path).map_err(|e| image_error(path, e))?;
    Ok(())
}

/// Save a reference frame as a stretched 8-bit grayscale PNG preview.
pub fn save_png(frame: &ReferenceFrame, path: &Path) -> Result<()> {
    let (h, w) = frame.dim();
    let pixels: Vec<u8> = stretch(frame).map(|v| (v * 255.0) as u8).collect();

    let img = GrayImage::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| LoadError::decode(path, "buffer size does not match dimensions"))?;
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| image_error(path, e))?;
    Ok(())
}

/// Save a preview, choosing the format from the file extension.
pub fn save_preview(frame: &ReferenceFrame, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(frame, path),
        _ => save_tiff(frame, path),
    }
}
