#![allow(dead_code)]

use std::path::{Path, PathBuf};

use imstack_core::io::fits::{write_fits, FitsPixel};
use imstack_core::io::ser::SER_HEADER_SIZE;
use ndarray::{Array2, Array3};

/// Build a SER file header for mono 8-bit frames.
///
/// Returns a `Vec<u8>` containing just the 178-byte header.
/// Append frame pixel data after calling this function.
pub fn build_ser_header(width: u32, height: u32, num_frames: usize) -> Vec<u8> {
    build_ser_header_full(width, height, 8, num_frames, 0)
}

/// Build a SER file header with configurable bit depth and color mode.
///
/// `color_id`: 0=MONO, 100=RGB, 101=BGR
pub fn build_ser_header_full(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: usize,
    color_id: i32,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID (4 bytes)
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID (4 bytes)
    buf.extend_from_slice(&color_id.to_le_bytes());
    // LittleEndian = 0 (little-endian per Siril convention)
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer, Instrument, Telescope (40 bytes each)
    buf.extend_from_slice(&[0u8; 120]);
    // DateTime, DateTimeUTC
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// Build a complete synthetic mono 8-bit SER file with the given frame data.
pub fn build_ser_with_frames(width: u32, height: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = build_ser_header(width, height, frames.len());
    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// Write raw bytes as `dir/name` and return the path.
pub fn write_bytes(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write test file");
    path
}

/// Write a 2D FITS image filled with one value.
pub fn write_flat_fits<T: FitsPixel>(dir: &Path, name: &str, h: usize, w: usize, value: T) -> PathBuf {
    let path = dir.join(name);
    write_fits(&path, &Array2::from_elem((h, w), value)).expect("write FITS image");
    path
}

/// Write a 3D FITS stack whose frame `i` is filled with `i * 10 + pixel index`.
pub fn write_ramp_fits_stack(dir: &Path, name: &str, count: usize, h: usize, w: usize) -> PathBuf {
    let path = dir.join(name);
    let data = ramp_stack(count, h, w);
    write_fits(&path, &data).expect("write FITS stack");
    path
}

pub fn ramp_stack(count: usize, h: usize, w: usize) -> Array3<i16> {
    Array3::from_shape_fn((count, h, w), |(i, y, x)| (i * 10 + y * w + x) as i16)
}

/// Raw FITS bytes for headers no writer would produce: the given cards then
/// END, padded, then `data`.
pub fn build_fits(cards: &[(&str, &str)], data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (key, value) in cards {
        buf.extend_from_slice(format!("{key:<8}= {value:>20}{:<50}", "").as_bytes());
    }
    buf.extend_from_slice(format!("{:<80}", "END").as_bytes());
    pad_block(&mut buf, b' ');
    buf.extend_from_slice(data);
    pad_block(&mut buf, 0);
    buf
}

fn pad_block(buf: &mut Vec<u8>, fill: u8) {
    let rem = buf.len() % 2880;
    if rem != 0 {
        buf.resize(buf.len() + 2880 - rem, fill);
    }
}
