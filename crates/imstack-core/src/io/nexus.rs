//! NeXus (HDF5) tomography files with sample, flat and dark frames in one dataset.

use std::path::Path;

use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use hdf5::File;
use ndarray::Ix3;

use crate::consts::NEXUS_DATA_PATH;
use crate::error::{LoadError, Result};
use crate::io::pixels::PixelData;
use crate::io::registry::{ContainerDecoder, FrameSource, InMemoryFrames};

#[derive(Clone, Copy, Debug, Default)]
pub struct NexusDecoder;

impl ContainerDecoder for NexusDecoder {
    fn name(&self) -> &'static str {
        "NeXus"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let h5 = |e: hdf5::Error| LoadError::decode(path, e.to_string());

        let file = File::open(path).map_err(h5)?;
        let dataset = file.dataset(NEXUS_DATA_PATH).map_err(h5)?;
        if dataset.ndim() != 3 {
            return Err(LoadError::decode(
                path,
                format!("{NEXUS_DATA_PATH} has {} axes, expected 3", dataset.ndim()),
            ));
        }

        let descriptor = dataset.dtype().and_then(|t| t.to_descriptor()).map_err(h5)?;
        macro_rules! read {
            ($t:ty, $variant:ident) => {
                PixelData::$variant(dataset.read::<$t, Ix3>().map_err(h5)?)
            };
        }

        let pixels = match descriptor {
            TypeDescriptor::Unsigned(IntSize::U1) => read!(u8, U8),
            TypeDescriptor::Unsigned(IntSize::U2) => read!(u16, U16),
            TypeDescriptor::Unsigned(IntSize::U4) => read!(u32, U32),
            TypeDescriptor::Integer(IntSize::U2) => read!(i16, I16),
            TypeDescriptor::Integer(IntSize::U4) => read!(i32, I32),
            TypeDescriptor::Integer(IntSize::U8) => read!(i64, I64),
            TypeDescriptor::Float(FloatSize::U4) => read!(f32, F32),
            TypeDescriptor::Float(FloatSize::U8) => read!(f64, F64),
            other => {
                return Err(LoadError::decode(
                    path,
                    format!("unsupported dataset type {other:?}"),
                ));
            }
        };

        Ok(Box::new(InMemoryFrames::new(pixels)))
    }
}
