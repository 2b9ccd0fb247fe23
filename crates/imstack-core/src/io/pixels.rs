use ndarray::{s, Array3, ArrayViewMut3, Zip};

use crate::error::{LoadError, Result};
use crate::frame::{ImageShape, Pixel};

/// Pixel values in the element type the file stores them in.
///
/// Always three-dimensional; a single image has a leading axis of length 1.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelData {
    U8(Array3<u8>),
    I16(Array3<i16>),
    U16(Array3<u16>),
    I32(Array3<i32>),
    U32(Array3<u32>),
    I64(Array3<i64>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

macro_rules! dispatch {
    ($self:expr, $arr:ident => $body:expr) => {
        match $self {
            PixelData::U8($arr) => $body,
            PixelData::I16($arr) => $body,
            PixelData::U16($arr) => $body,
            PixelData::I32($arr) => $body,
            PixelData::U32($arr) => $body,
            PixelData::I64($arr) => $body,
            PixelData::F32($arr) => $body,
            PixelData::F64($arr) => $body,
        }
    };
}

impl PixelData {
    /// (count, height, width).
    pub fn dim(&self) -> (usize, usize, usize) {
        dispatch!(self, a => a.dim())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::U8(_) => "uint8",
            Self::I16(_) => "int16",
            Self::U16(_) => "uint16",
            Self::I32(_) => "int32",
            Self::U32(_) => "uint32",
            Self::I64(_) => "int64",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
        }
    }

    /// Copy into `dest`, casting each element to `T` as `as` would.
    ///
    /// Returns `None` when the shapes disagree; nothing is written in that case.
    pub fn cast_into<T: Pixel>(&self, dest: ArrayViewMut3<'_, T>) -> Option<()> {
        if self.dim() != dest.dim() {
            return None;
        }
        dispatch!(self, a => Zip::from(dest)
            .and(a)
            .for_each(|d, &s| *d = T::cast_from(s)));
        Some(())
    }

    /// Copy of frame `index` as a (1, height, width) array.
    ///
    /// Panics if `index` is out of range.
    pub fn frame(&self, index: usize) -> PixelData {
        let range = s![index..index + 1, .., ..];
        match self {
            Self::U8(a) => Self::U8(a.slice(range).to_owned()),
            Self::I16(a) => Self::I16(a.slice(range).to_owned()),
            Self::U16(a) => Self::U16(a.slice(range).to_owned()),
            Self::I32(a) => Self::I32(a.slice(range).to_owned()),
            Self::U32(a) => Self::U32(a.slice(range).to_owned()),
            Self::I64(a) => Self::I64(a.slice(range).to_owned()),
            Self::F32(a) => Self::F32(a.slice(range).to_owned()),
            Self::F64(a) => Self::F64(a.slice(range).to_owned()),
        }
    }

    /// Convert the whole buffer to an owned array of `T`.
    pub fn to_array<T: Pixel>(&self) -> Array3<T> {
        dispatch!(self, a => a.mapv(T::cast_from))
    }
}

/// A decoded file: its logical shape plus native pixel values.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub shape: ImageShape,
    pub pixels: PixelData,
}

impl DecodedImage {
    pub fn new(shape: ImageShape, pixels: PixelData) -> Self {
        Self { shape, pixels }
    }

    /// Write into one destination row, or fail naming both shapes.
    pub(crate) fn write_row<T: Pixel>(
        &self,
        path: &std::path::Path,
        expected: ImageShape,
        dest: ArrayViewMut3<'_, T>,
    ) -> Result<()> {
        if self.shape != expected {
            return Err(LoadError::ShapeMismatch {
                path: path.to_path_buf(),
                expected,
                actual: self.shape,
            });
        }
        self.pixels
            .cast_into(dest)
            .ok_or_else(|| LoadError::ShapeMismatch {
                path: path.to_path_buf(),
                expected,
                actual: self.shape,
            })
    }
}
