use std::path::{Path, PathBuf};

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use fitsio::threadsafe_fitsfile::ThreadsafeFitsFile;
use fitsio::FitsFile;
use ndarray::{Array3, ArrayBase, Data, Dimension};

use crate::consts::FITS_MAX_HDUS;
use crate::error::{LoadError, Result};
use crate::frame::ImageShape;
use crate::io::pixels::{DecodedImage, PixelData};
use crate::io::registry::{FileContents, FrameSource, ImageDecoder};

fn fits_error(path: &Path) -> impl Fn(fitsio::errors::Error) -> LoadError + '_ {
    move |err| LoadError::decode(path, err.to_string())
}

/// FITS image reader backed by cfitsio.
///
/// The first HDU (primary or `IMAGE` extension) holding at least a 2D
/// image is used. A third axis makes the file a stack of frames. cfitsio
/// applies BZERO/BSCALE, so unsigned 16/32-bit data arrives as `u16`/`u32`
/// and other scalings as floating point.
pub struct FitsReader {
    file: ThreadsafeFitsFile,
    hdu: FitsHdu,
    path: PathBuf,
    shape: ImageShape,
    image_type: ImageType,
    /// Index of the HDU the image was found in (0 = primary).
    pub hdu_index: usize,
}

impl FitsReader {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::metadata(path).map_err(|e| LoadError::io(path, e))?;
        let mut fptr = FitsFile::open(path).map_err(fits_error(path))?;

        for hdu_index in 0..FITS_MAX_HDUS {
            let Ok(hdu) = fptr.hdu(hdu_index) else {
                break;
            };
            let HduInfo::ImageInfo { shape, image_type } = &hdu.info else {
                continue;
            };
            if shape.len() < 2 || shape.contains(&0) {
                continue;
            }
            let shape = image_shape(shape, path)?;
            let image_type = image_type.clone();
            return Ok(Self {
                file: fptr.threadsafe(),
                hdu,
                path: path.to_path_buf(),
                shape,
                image_type,
                hdu_index,
            });
        }

        Err(LoadError::decode(
            path,
            "Could not load at least one FITS image from the file",
        ))
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn frame_count(&self) -> usize {
        self.shape.count()
    }

    /// Decode one frame as a (1, height, width) array.
    pub fn read_frame(&self, index: usize) -> Result<PixelData> {
        let total = self.frame_count();
        if index >= total {
            return Err(LoadError::FrameIndexOutOfRange { index, total });
        }
        self.read_frames(index, 1)
    }

    /// Decode the whole image or stack.
    pub fn read_all(&self) -> Result<DecodedImage> {
        let pixels = self.read_frames(0, self.frame_count())?;
        Ok(DecodedImage::new(self.shape, pixels))
    }

    fn read_frames(&self, first: usize, count: usize) -> Result<PixelData> {
        let frame_len = self.shape.height() * self.shape.width();
        let start = first * frame_len;
        let dim = (count, self.shape.height(), self.shape.width());
        let end = start + count * frame_len;

        Ok(match self.image_type {
            ImageType::UnsignedByte => PixelData::U8(self.read_section(start, end, dim)?),
            ImageType::Byte | ImageType::Short => {
                PixelData::I16(self.read_section(start, end, dim)?)
            }
            ImageType::UnsignedShort => PixelData::U16(self.read_section(start, end, dim)?),
            ImageType::Long => PixelData::I32(self.read_section(start, end, dim)?),
            ImageType::UnsignedLong => PixelData::U32(self.read_section(start, end, dim)?),
            ImageType::LongLong => PixelData::I64(self.read_section(start, end, dim)?),
            ImageType::Float => PixelData::F32(self.read_section(start, end, dim)?),
            ImageType::Double => PixelData::F64(self.read_section(start, end, dim)?),
        })
    }

    fn read_section<T>(
        &self,
        start: usize,
        end: usize,
        dim: (usize, usize, usize),
    ) -> Result<Array3<T>>
    where
        Vec<T>: ReadImage,
    {
        let mut fptr = self
            .file
            .lock()
            .map_err(|_| LoadError::decode(&self.path, "FITS handle poisoned by a failed read"))?;
        let values: Vec<T> = self
            .hdu
            .read_section(&mut fptr, start, end)
            .map_err(fits_error(&self.path))?;
        Array3::from_shape_vec(dim, values).map_err(|e| LoadError::decode(&self.path, e.to_string()))
    }
}

// SAFETY: the cfitsio handle is only reached through `ThreadsafeFitsFile`'s
// mutex (see `read_section`), which fitsio already declares `Send`.
unsafe impl Sync for FitsReader {}

impl FrameSource for FitsReader {
    fn frame_count(&self) -> usize {
        FitsReader::frame_count(self)
    }

    fn frame_shape(&self) -> ImageShape {
        self.shape.frame()
    }

    fn frame(&self, index: usize) -> Result<PixelData> {
        self.read_frame(index)
    }
}

/// Map cfitsio's slowest-first axes to an image shape.
///
/// Axes beyond the third must be degenerate. The pixel count must fit in
/// `usize`.
fn image_shape(axes: &[usize], path: &Path) -> Result<ImageShape> {
    let (extra, axes) = axes.split_at(axes.len().saturating_sub(3));
    if extra.iter().any(|&a| a != 1) {
        return Err(LoadError::decode(
            path,
            format!("unsupported image with {} axes", extra.len() + 3),
        ));
    }
    axes.iter()
        .try_fold(1usize, |n, &a| n.checked_mul(a))
        .ok_or_else(|| LoadError::decode(path, format!("image axes {axes:?} overflow")))?;

    match *axes {
        [height, width] => Ok(ImageShape::Single { height, width }),
        [count, height, width] => Ok(ImageShape::Stack {
            count,
            height,
            width,
        }),
        _ => Err(LoadError::decode(path, "image has fewer than two axes")),
    }
}

/// Decoder for the self-describing FITS format.
#[derive(Clone, Copy, Debug, Default)]
pub struct FitsDecoder;

impl ImageDecoder for FitsDecoder {
    fn name(&self) -> &'static str {
        "FITS"
    }

    fn probe(&self, path: &Path) -> Result<ImageShape> {
        Ok(FitsReader::open(path)?.shape())
    }

    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        FitsReader::open(path)?.read_all()
    }

    fn open_stack(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FitsReader::open(path)?))
    }

    fn inspect(&self, path: &Path) -> Result<FileContents> {
        let reader = FitsReader::open(path)?;
        Ok(match reader.shape() {
            shape @ ImageShape::Single { .. } => FileContents::Single(shape),
            ImageShape::Stack { .. } => FileContents::Stack(Box::new(reader)),
        })
    }
}

/// Element types that can be written as FITS primary-HDU data.
pub trait FitsPixel: Copy + WriteImage {
    const IMAGE_TYPE: ImageType;
}

macro_rules! impl_fits_pixel {
    ($($t:ty => $image_type:ident),* $(,)?) => {
        $(
            impl FitsPixel for $t {
                const IMAGE_TYPE: ImageType = ImageType::$image_type;
            }
        )*
    };
}

impl_fits_pixel!(
    u8 => UnsignedByte,
    i16 => Short,
    u16 => UnsignedShort,
    i32 => Long,
    f32 => Float,
    f64 => Double,
);

/// Write a 2D image or 3D stack as a single-HDU FITS file, replacing any
/// existing file.
pub fn write_fits<T, S, D>(path: &Path, data: &ArrayBase<S, D>) -> Result<()>
where
    T: FitsPixel,
    S: Data<Elem = T>,
    D: Dimension,
{
    if !(2..=3).contains(&data.ndim()) {
        return Err(LoadError::InvalidConfig(format!(
            "FITS output needs a 2D or 3D array, got {} axes",
            data.ndim()
        )));
    }

    // fitsio refuses to overwrite
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| LoadError::io(path, e))?;
    }

    let description = ImageDescription {
        data_type: T::IMAGE_TYPE,
        dimensions: data.shape(),
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .open()
        .map_err(fits_error(path))?;
    let hdu = fptr.primary_hdu().map_err(fits_error(path))?;

    // Logical iteration order is row-major regardless of memory layout.
    let pixels: Vec<T> = data.iter().copied().collect();
    hdu.write_image(&mut fptr, &pixels).map_err(fits_error(path))
}
