use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{Array3, Axis};

use crate::error::{LoadError, Result};
use crate::frame::ImageShape;
use crate::io::pixels::{DecodedImage, PixelData};
use crate::io::registry::{FileContents, FrameSource, ImageDecoder};

pub const SER_HEADER_SIZE: usize = 178;
pub const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            100 | 101 => 3,
            _ => 1,
        }
    }

    /// Total bytes per frame, `None` on overflow.
    pub fn frame_byte_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel_plane() * self.planes_per_pixel())
    }

    pub fn shape(&self) -> ImageShape {
        ImageShape::Stack {
            count: self.frame_count as usize,
            height: self.height as usize,
            width: self.width as usize,
        }
    }
}

/// Memory-mapped SER file reader.
///
/// Pixel values are returned as stored (u8 or u16), one plane per frame.
/// RGB/BGR files yield their green plane.
pub struct SerReader {
    mmap: Mmap,
    path: PathBuf,
    frame_size: usize,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| LoadError::io(path, e))?;

        if mmap.len() < SER_HEADER_SIZE {
            return Err(LoadError::decode(path, "file too small for SER header"));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(LoadError::decode(path, "missing LUCAM-RECORDER magic"));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE], path)?;
        let frame_size = header
            .frame_byte_size()
            .ok_or_else(|| LoadError::decode(path, "frame size overflow"))?;

        let expected_data_size = frame_size
            .checked_mul(header.frame_count as usize)
            .and_then(|n| n.checked_add(SER_HEADER_SIZE))
            .ok_or_else(|| LoadError::decode(path, "data size overflow"))?;
        if mmap.len() < expected_data_size {
            return Err(LoadError::decode(
                path,
                format!(
                    "file truncated: expected at least {} bytes, got {}",
                    expected_data_size,
                    mmap.len()
                ),
            ));
        }

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            frame_size,
            header,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(LoadError::FrameIndexOutOfRange {
                index,
                total: count,
            });
        }
        let offset = SER_HEADER_SIZE + index * self.frame_size;
        Ok(&self.mmap[offset..offset + self.frame_size])
    }

    /// Read a single frame as a (1, height, width) array.
    pub fn read_frame(&self, index: usize) -> Result<PixelData> {
        let raw = self.frame_raw(index)?;
        let h = self.header.height as usize;
        let w = self.header.width as usize;
        let planes = self.header.planes_per_pixel();
        // Green for RGB/BGR, the only plane otherwise.
        let plane = if planes == 1 { 0 } else { 1 };

        let pixels = if self.header.bytes_per_pixel_plane() == 1 {
            let values = (0..h * w).map(|i| raw[i * planes + plane]).collect();
            PixelData::U8(self.to_frame(h, w, values)?)
        } else {
            let little_endian = self.header.little_endian;
            let values = (0..h * w)
                .map(|i| {
                    let idx = (i * planes + plane) * 2;
                    let pair = [raw[idx], raw[idx + 1]];
                    if little_endian {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    }
                })
                .collect();
            PixelData::U16(self.to_frame(h, w, values)?)
        };
        Ok(pixels)
    }

    /// Read every frame into one native stack.
    pub fn read_all(&self) -> Result<DecodedImage> {
        let frames = (0..self.frame_count())
            .map(|i| self.read_frame(i))
            .collect::<Result<Vec<_>>>()?;
        let pixels = if self.header.bytes_per_pixel_plane() == 1 {
            let views: Vec<_> = frames
                .iter()
                .filter_map(|f| match f {
                    PixelData::U8(a) => Some(a.view()),
                    _ => None,
                })
                .collect();
            PixelData::U8(self.concat(&views)?)
        } else {
            let views: Vec<_> = frames
                .iter()
                .filter_map(|f| match f {
                    PixelData::U16(a) => Some(a.view()),
                    _ => None,
                })
                .collect();
            PixelData::U16(self.concat(&views)?)
        };
        Ok(DecodedImage::new(self.header.shape(), pixels))
    }

    fn to_frame<T>(&self, h: usize, w: usize, values: Vec<T>) -> Result<Array3<T>> {
        Array3::from_shape_vec((1, h, w), values)
            .map_err(|e| LoadError::decode(&self.path, e.to_string()))
    }

    fn concat<T: Clone>(&self, views: &[ndarray::ArrayView3<'_, T>]) -> Result<Array3<T>> {
        if views.is_empty() {
            return Err(LoadError::decode(&self.path, "SER file holds no frames"));
        }
        ndarray::concatenate(Axis(0), views)
            .map_err(|e| LoadError::decode(&self.path, e.to_string()))
    }
}

impl FrameSource for SerReader {
    fn frame_count(&self) -> usize {
        SerReader::frame_count(self)
    }

    fn frame_shape(&self) -> ImageShape {
        self.header.shape().frame()
    }

    fn frame(&self, index: usize) -> Result<PixelData> {
        self.read_frame(index)
    }
}

fn parse_header(buf: &[u8], path: &Path) -> Result<SerHeader> {
    let io_err = |e| LoadError::io(path, e);
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>().map_err(io_err)?;
    let color_id = cursor.read_i32::<LittleEndian>().map_err(io_err)?;
    let le_flag = cursor.read_i32::<LittleEndian>().map_err(io_err)?;
    let width = cursor.read_i32::<LittleEndian>().map_err(io_err)? as u32;
    let height = cursor.read_i32::<LittleEndian>().map_err(io_err)? as u32;
    let pixel_depth = cursor.read_i32::<LittleEndian>().map_err(io_err)? as u32;
    let frame_count = cursor.read_i32::<LittleEndian>().map_err(io_err)? as u32;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>().map_err(io_err)?;
    let date_time_utc = cursor.read_u64::<LittleEndian>().map_err(io_err)?;

    if width == 0 || height == 0 {
        return Err(LoadError::decode(
            path,
            format!("invalid image dimensions: {width}x{height}"),
        ));
    }
    if pixel_depth == 0 || pixel_depth > 16 {
        return Err(LoadError::decode(
            path,
            format!("unsupported pixel depth {pixel_depth}"),
        ));
    }

    // Per the SER format, LittleEndian = 0 means big-endian pixel data,
    // but many writers (including FireCapture) use 0 for little-endian.
    // Follow Siril's convention: treat 0 as little-endian.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width,
        height,
        pixel_depth,
        frame_count,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// Decoder for SER captures; every file is a stack of frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerDecoder;

impl ImageDecoder for SerDecoder {
    fn name(&self) -> &'static str {
        "SER"
    }

    fn probe(&self, path: &Path) -> Result<ImageShape> {
        Ok(SerReader::open(path)?.header.shape())
    }

    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        SerReader::open(path)?.read_all()
    }

    fn open_stack(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(SerReader::open(path)?))
    }

    fn inspect(&self, path: &Path) -> Result<FileContents> {
        Ok(FileContents::Stack(self.open_stack(path)?))
    }
}
