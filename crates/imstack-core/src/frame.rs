use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Array3};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// Sample stack: axis 0 is acquisition order, axes 1-2 are spatial.
pub type ImageStack<T> = Array3<T>;

/// Per-pixel mean of a flat or dark stack.
pub type ReferenceFrame = Array2<f64>;

/// Dimensions of a decoded image or image stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageShape {
    Single { height: usize, width: usize },
    Stack {
        count: usize,
        height: usize,
        width: usize,
    },
}

impl ImageShape {
    pub fn height(&self) -> usize {
        match *self {
            Self::Single { height, .. } | Self::Stack { height, .. } => height,
        }
    }

    pub fn width(&self) -> usize {
        match *self {
            Self::Single { width, .. } | Self::Stack { width, .. } => width,
        }
    }

    /// Number of frames, 1 for a single image.
    pub fn count(&self) -> usize {
        match *self {
            Self::Single { .. } => 1,
            Self::Stack { count, .. } => count,
        }
    }

    /// Shape of one frame, dropping the stack axis if present.
    pub fn frame(&self) -> ImageShape {
        ImageShape::Single {
            height: self.height(),
            width: self.width(),
        }
    }

    pub fn is_stack(&self) -> bool {
        matches!(self, Self::Stack { .. })
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single { height, width } => write!(f, "({height}, {width})"),
            Self::Stack {
                count,
                height,
                width,
            } => write!(f, "({count}, {height}, {width})"),
        }
    }
}

/// Image format token. The token doubles as the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Fits,
    Fit,
    Tif,
    Tiff,
    Ser,
    Nxs,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 6] = [
        Self::Fits,
        Self::Fit,
        Self::Tif,
        Self::Tiff,
        Self::Ser,
        Self::Nxs,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Fits => "fits",
            Self::Fit => "fit",
            Self::Tif => "tif",
            Self::Tiff => "tiff",
            Self::Ser => "ser",
            Self::Nxs => "nxs",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let token = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == token)
            .ok_or_else(|| format!("unknown image format '{s}'"))
    }
}

/// Element type of the destination sample stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Uint8,
    Uint16,
    Int16,
    Int32,
    #[default]
    Float32,
    Float64,
}

impl DType {
    pub const ALL: [DType; 6] = [
        Self::Uint8,
        Self::Uint16,
        Self::Int16,
        Self::Int32,
        Self::Float32,
        Self::Float64,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    pub fn size_of(&self) -> usize {
        match self {
            Self::Uint8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.name() == token)
            .ok_or_else(|| format!("unknown dtype '{s}'"))
    }
}

/// Element type a decoder can hand back, castable to every [`Pixel`].
pub trait NativePixel:
    Copy
    + 'static
    + AsPrimitive<u8>
    + AsPrimitive<u16>
    + AsPrimitive<i16>
    + AsPrimitive<i32>
    + AsPrimitive<f32>
    + AsPrimitive<f64>
{
}

impl NativePixel for u8 {}
impl NativePixel for i16 {}
impl NativePixel for u16 {}
impl NativePixel for i32 {}
impl NativePixel for u32 {}
impl NativePixel for i64 {}
impl NativePixel for f32 {}
impl NativePixel for f64 {}

/// Element type a stack can be loaded into.
pub trait Pixel: Copy + Default + Send + Sync + num_traits::Zero + fmt::Debug + 'static {
    const DTYPE: DType;

    /// Numeric cast with `as` semantics: float to integer saturates (NaN
    /// becomes 0) and integer to narrower integer wraps.
    fn cast_from<S: NativePixel>(v: S) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! impl_pixel {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Pixel for $t {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn cast_from<S: NativePixel>(v: S) -> Self {
                    <S as AsPrimitive<$t>>::as_(v)
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_pixel!(
    u8 => Uint8,
    u16 => Uint16,
    i16 => Int16,
    i32 => Int32,
    f32 => Float32,
    f64 => Float64,
);

/// Sample stack plus optional reference frames, as returned by the loader.
#[derive(Clone, Debug)]
pub struct LoadResult<T> {
    pub sample: ImageStack<T>,
    pub flat: Option<ReferenceFrame>,
    pub dark: Option<ReferenceFrame>,
}

impl<T> LoadResult<T> {
    pub fn sample_shape(&self) -> ImageShape {
        let (count, height, width) = self.sample.dim();
        ImageShape::Stack {
            count,
            height,
            width,
        }
    }
}
