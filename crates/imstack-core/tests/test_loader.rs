mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{build_ser_with_frames, ramp_stack, write_bytes, write_flat_fits, write_ramp_fits_stack};
use imstack_core::consts::{FLAT_LABEL, SAMPLE_LABEL, SAMPLE_PARALLEL_LABEL};
use imstack_core::error::{LoadError, Result};
use imstack_core::frame::{DType, ImageFormat, ImageShape};
use imstack_core::io::fits::FitsDecoder;
use imstack_core::io::pixels::DecodedImage;
use imstack_core::io::registry::{DecoderRegistry, FileContents, FrameSource, ImageDecoder};
use imstack_core::loader::{LoadedStack, Loader, LoaderConfig};
use imstack_core::progress::{CountingProgress, NoProgress};
use ndarray::{Array2, Array3};

fn stack_shape(count: usize, height: usize, width: usize) -> ImageShape {
    ImageShape::Stack {
        count,
        height,
        width,
    }
}

#[test]
fn test_sample_with_flat_and_no_dark() {
    let dir = tempfile::tempdir().unwrap();
    let sample = dir.path().join("sample");
    let flat = dir.path().join("flat");
    std::fs::create_dir_all(&sample).unwrap();
    std::fs::create_dir_all(&flat).unwrap();
    write_flat_fits(&sample, "a2.fits", 2, 2, 3i16);
    write_flat_fits(&sample, "a1.fits", 2, 2, 1i16);
    write_flat_fits(&flat, "f.fits", 2, 2, 2i16);

    let registry = DecoderRegistry::with_defaults();
    let progress = CountingProgress::new();
    let loader = Loader::new(&registry, &progress);
    let config = LoaderConfig::new(&sample, ImageFormat::Fits).with_flat(&flat);

    let result = loader.load::<f32>(&config).unwrap();

    let mut expected = Array3::<f32>::ones((2, 2, 2));
    expected.index_axis_mut(ndarray::Axis(0), 1).fill(3.0);
    assert_eq!(result.sample, expected);
    assert_eq!(result.flat, Some(Array2::from_elem((2, 2), 2.0)));
    assert!(result.dark.is_none());
    assert_eq!(result.sample_shape(), stack_shape(2, 2, 2));

    assert_eq!(
        progress.phases(),
        vec![(SAMPLE_LABEL.to_string(), 2), (FLAT_LABEL.to_string(), 1)]
    );
    assert_eq!(progress.advanced(), 3);
}

#[test]
fn test_averages_several_reference_files() {
    let dir = tempfile::tempdir().unwrap();
    let sample = dir.path().join("sample");
    let dark = dir.path().join("dark");
    std::fs::create_dir_all(&sample).unwrap();
    std::fs::create_dir_all(&dark).unwrap();
    write_flat_fits(&sample, "s1.fits", 1, 3, 100u16);
    write_flat_fits(&dark, "d1.fits", 1, 3, 10u16);
    write_flat_fits(&dark, "d2.fits", 1, 3, 11u16);

    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new(&sample, ImageFormat::Fits).with_dark(&dark);
    let result = Loader::new(&registry, &NoProgress)
        .load::<u16>(&config)
        .unwrap();

    assert!(result.flat.is_none());
    let dark = result.dark.unwrap();
    assert!(dark.iter().all(|&v| v == 10.5));
}

#[test]
fn test_missing_sample_files() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new(dir.path(), ImageFormat::Fits);

    let err = Loader::new(&registry, &NoProgress)
        .load::<f32>(&config)
        .unwrap_err();
    assert!(matches!(err, LoadError::NotFound { .. }));
}

#[test]
fn test_configured_but_empty_flat_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let sample = dir.path().join("sample");
    let flat = dir.path().join("flat");
    std::fs::create_dir_all(&sample).unwrap();
    std::fs::create_dir_all(&flat).unwrap();
    write_flat_fits(&sample, "a1.fits", 2, 2, 1u8);

    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new(&sample, ImageFormat::Fits).with_flat(&flat);
    let err = Loader::new(&registry, &NoProgress)
        .load::<f32>(&config)
        .unwrap_err();

    match err {
        LoadError::NotFound { path, .. } => assert_eq!(path, flat),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_flat_shape_must_match_sample() {
    let dir = tempfile::tempdir().unwrap();
    let sample = dir.path().join("sample");
    let flat = dir.path().join("flat");
    std::fs::create_dir_all(&sample).unwrap();
    std::fs::create_dir_all(&flat).unwrap();
    write_flat_fits(&sample, "a1.fits", 2, 2, 1u8);
    let bad = write_flat_fits(&flat, "f1.fits", 4, 4, 1u8);

    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new(&sample, ImageFormat::Fits).with_flat(&flat);
    let err = Loader::new(&registry, &NoProgress)
        .load::<f32>(&config)
        .unwrap_err();
    assert!(matches!(err, LoadError::ShapeMismatch { ref path, .. } if *path == bad));
}

#[test]
fn test_unregistered_format_fails_before_io() {
    let registry = DecoderRegistry::empty();
    let config = LoaderConfig::new("/definitely/not/here", ImageFormat::Fits);

    let err = Loader::new(&registry, &NoProgress)
        .load::<f32>(&config)
        .unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat(ref f) if f == "fits"));
}

#[cfg(not(feature = "nexus"))]
#[test]
fn test_container_format_needs_feature() {
    let registry = DecoderRegistry::with_defaults();
    assert!(!registry.supports(ImageFormat::Nxs));

    let config = LoaderConfig::new("/definitely/not/here", ImageFormat::Nxs);
    let err = Loader::new(&registry, &NoProgress)
        .load::<f32>(&config)
        .unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat(_)));
}

#[test]
fn test_invalid_worker_count() {
    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new("samples", ImageFormat::Fits).with_workers(0, None);

    let err = Loader::new(&registry, &NoProgress)
        .load::<f32>(&config)
        .unwrap_err();
    assert!(matches!(err, LoadError::InvalidConfig(_)));
}

#[test]
fn test_stacked_fits_takes_parallel_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ramp_fits_stack(dir.path(), "stack1.fits", 6, 2, 3);
    write_ramp_fits_stack(dir.path(), "stack2.fits", 2, 2, 3);

    let registry = DecoderRegistry::with_defaults();
    let progress = CountingProgress::new();
    let config = LoaderConfig::new(&path, ImageFormat::Fits).with_workers(3, Some(2));

    let result = Loader::new(&registry, &progress)
        .load::<i32>(&config)
        .unwrap();

    assert_eq!(result.sample, ramp_stack(6, 2, 3).mapv(i32::from));
    assert_eq!(
        progress.phases(),
        vec![(SAMPLE_PARALLEL_LABEL.to_string(), 6)]
    );
}

/// FITS decoder that counts every file it opens.
#[derive(Default)]
struct CountingDecoder {
    opens: AtomicUsize,
}

impl CountingDecoder {
    fn opened(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    fn tick(&self) {
        self.opens.fetch_add(1, Ordering::Relaxed);
    }
}

impl ImageDecoder for CountingDecoder {
    fn name(&self) -> &'static str {
        "counting FITS"
    }

    fn probe(&self, path: &Path) -> Result<ImageShape> {
        self.tick();
        FitsDecoder.probe(path)
    }

    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        self.tick();
        FitsDecoder.decode(path)
    }

    fn open_stack(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        self.tick();
        FitsDecoder.open_stack(path)
    }

    fn inspect(&self, path: &Path) -> Result<FileContents> {
        self.tick();
        FitsDecoder.inspect(path)
    }
}

#[test]
fn test_stacked_sample_is_opened_once() {
    let dir = tempfile::tempdir().unwrap();
    write_ramp_fits_stack(dir.path(), "stack.fits", 4, 2, 2);

    let decoder = Arc::new(CountingDecoder::default());
    let mut registry = DecoderRegistry::empty();
    registry.register_image(ImageFormat::Fits, decoder.clone());

    let config = LoaderConfig::new(dir.path(), ImageFormat::Fits).with_workers(2, None);
    let result = Loader::new(&registry, &NoProgress)
        .load::<i16>(&config)
        .unwrap();

    assert_eq!(result.sample, ramp_stack(4, 2, 2));
    assert_eq!(decoder.opened(), 1);
}

#[test]
fn test_ser_sample() {
    let dir = tempfile::tempdir().unwrap();
    let frames = vec![vec![1u8; 4], vec![2u8; 4], vec![3u8; 4]];
    write_bytes(dir.path(), "cap.ser", &build_ser_with_frames(2, 2, &frames));

    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new(dir.path(), ImageFormat::Ser).with_workers(2, None);
    let result = Loader::new(&registry, &NoProgress)
        .load::<u8>(&config)
        .unwrap();

    assert_eq!(result.sample_shape(), stack_shape(3, 2, 2));
    for (i, frame) in result.sample.outer_iter().enumerate() {
        assert!(frame.iter().all(|&v| v as usize == i + 1));
    }
}

#[test]
fn test_zero_frame_stack_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_bytes(dir.path(), "empty.ser", &build_ser_with_frames(2, 2, &[]));

    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new(dir.path(), ImageFormat::Ser);
    let err = Loader::new(&registry, &NoProgress)
        .load::<u8>(&config)
        .unwrap_err();
    assert!(matches!(err, LoadError::EmptyStack));
}

#[test]
fn test_load_dynamic_uses_output_dtype() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_fits(dir.path(), "a1.fits", 2, 2, 300.6f32);

    let registry = DecoderRegistry::with_defaults();
    let loader = Loader::new(&registry, &NoProgress);

    let config = LoaderConfig::new(dir.path(), ImageFormat::Fits).with_dtype(DType::Uint16);
    let loaded = loader.load_dynamic(&config).unwrap();
    assert_eq!(loaded.dtype(), DType::Uint16);
    let LoadedStack::Uint16(result) = &loaded else {
        panic!("expected a uint16 stack");
    };
    assert!(result.sample.iter().all(|&v| v == 300));

    let config = config.with_dtype(DType::Float64);
    let loaded = loader.load_dynamic(&config).unwrap();
    assert_eq!(loaded.dtype(), DType::Float64);
    assert_eq!(loaded.sample_shape(), stack_shape(1, 2, 2));
    let st = loaded.sample_stats().unwrap();
    approx::assert_abs_diff_eq!(st.mean, 300.6f32 as f64);
    assert!(loaded.flat().is_none());
}

#[test]
fn test_file_path_loads_its_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_fits(dir.path(), "img10.fits", 1, 1, 10u8);
    let first = write_flat_fits(dir.path(), "img2.fits", 1, 1, 2u8);
    write_flat_fits(dir.path(), "img1.fits", 1, 1, 1u8);

    let registry = DecoderRegistry::with_defaults();
    let config = LoaderConfig::new(&first, ImageFormat::Fits);
    let result = Loader::new(&registry, &NoProgress)
        .load::<f64>(&config)
        .unwrap();

    assert_eq!(
        result.sample.iter().copied().collect::<Vec<_>>(),
        vec![1.0, 2.0, 10.0]
    );
}
