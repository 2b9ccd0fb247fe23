use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use ndarray::Array2;

use imstack_core::error::LoadError;
use imstack_core::frame::ImageShape;
use imstack_core::io::image_io::{save_png, save_preview, save_tiff, TiffDecoder};
use imstack_core::io::pixels::PixelData;
use imstack_core::io::registry::ImageDecoder;

#[test]
fn test_decode_gray16_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g16.tif");
    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_fn(3, 2, |x, y| Luma([(y * 3 + x) as u16 * 1000]));
    img.save(&path).unwrap();

    assert_eq!(
        TiffDecoder.probe(&path).unwrap(),
        ImageShape::Single { height: 2, width: 3 }
    );

    let decoded = TiffDecoder.decode(&path).unwrap();
    let PixelData::U16(values) = &decoded.pixels else {
        panic!("expected uint16, got {}", decoded.pixels.type_name());
    };
    assert_eq!(values.dim(), (1, 2, 3));
    assert_eq!(values[[0, 1, 2]], 5000);
}

#[test]
fn test_decode_gray8_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g8.tiff");
    GrayImage::from_pixel(4, 4, Luma([77])).save(&path).unwrap();

    let decoded = TiffDecoder.decode(&path).unwrap();
    assert_eq!(decoded.pixels.type_name(), "uint8");
    assert!(decoded.pixels.to_array::<u8>().iter().all(|&v| v == 77));
}

#[test]
fn test_color_tiff_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgb.tif");
    RgbImage::new(2, 2).save(&path).unwrap();

    let err = TiffDecoder.decode(&path).unwrap_err();
    assert!(matches!(err, LoadError::Decode { .. }));
}

#[test]
fn test_save_tiff_preview_stretches() {
    let mut data = Array2::<f64>::zeros((4, 4));
    data[[0, 1]] = 50.0;
    data[[3, 3]] = 100.0;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flat.tiff");
    save_tiff(&data, &path).unwrap();

    let decoded = TiffDecoder.decode(&path).unwrap();
    let values = decoded.pixels.to_array::<u16>();
    assert_eq!(values[[0, 0, 0]], 0);
    assert_eq!(values[[0, 3, 3]], 65535);
    assert!((values[[0, 0, 1]] as i32 - 32767).abs() <= 1);
}

#[test]
fn test_save_png() {
    let data = Array2::<f64>::from_elem((8, 8), 0.5);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.png");

    save_png(&data, &path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_save_preview_picks_format() {
    let data = Array2::<f64>::from_shape_fn((3, 3), |(y, x)| (y + x) as f64);
    let dir = tempfile::tempdir().unwrap();

    let png = dir.path().join("p.png");
    save_preview(&data, &png).unwrap();
    assert_eq!(image::image_dimensions(&png).unwrap(), (3, 3));

    let tiff = dir.path().join("p.tif");
    save_preview(&data, &tiff).unwrap();
    assert_eq!(TiffDecoder.decode(&tiff).unwrap().pixels.type_name(), "uint16");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(TiffDecoder.decode(&dir.path().join("none.tif")).is_err());
}
