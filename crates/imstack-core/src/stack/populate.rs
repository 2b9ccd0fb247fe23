use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::{s, Array3, ArrayViewMut3, Axis};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::frame::{ImageShape, ImageStack, Pixel};
use crate::io::registry::{FrameSource, ImageDecoder};
use crate::progress::{Phase, ProgressSink};

/// Allocate a zeroed (count, height, width) stack.
///
/// Fails with `AllocationFailure` instead of aborting when the buffer cannot
/// be sized or reserved, so callers can report it before touching any file.
pub fn allocate_stack<T: Pixel>(
    count: usize,
    height: usize,
    width: usize,
) -> Result<ImageStack<T>> {
    let shape = [count, height, width];
    let fail = |reason: String| LoadError::AllocationFailure { shape, reason };

    let len = count
        .checked_mul(height)
        .and_then(|n| n.checked_mul(width))
        .ok_or_else(|| fail("element count overflows usize".into()))?;
    let bytes = len
        .checked_mul(std::mem::size_of::<T>())
        .filter(|&b| b <= isize::MAX as usize)
        .ok_or_else(|| fail("buffer exceeds the addressable size".into()))?;

    let mut buf: Vec<T> = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| fail(e.to_string()))?;
    buf.resize(len, T::zero());
    debug!(?shape, bytes, dtype = %T::DTYPE, "Allocated stack");

    Array3::from_shape_vec((count, height, width), buf).map_err(|e| fail(e.to_string()))
}

/// Decode `files` one at a time into a new (N, H, W) stack, row i from file i.
///
/// Every file must decode to exactly `frame_shape`; anything else is a
/// `ShapeMismatch` naming the file. Nothing is cropped or padded.
pub fn populate_files<T: Pixel>(
    decoder: &dyn ImageDecoder,
    files: &[PathBuf],
    frame_shape: ImageShape,
    progress: &dyn ProgressSink,
    label: &str,
) -> Result<ImageStack<T>> {
    let expected = frame_shape.frame();
    let mut data = allocate_stack::<T>(files.len(), expected.height(), expected.width())?;

    let phase = Phase::start(progress, files.len(), label);
    for (idx, path) in files.iter().enumerate() {
        let image = decoder.decode(path)?;
        image.write_row(path, expected, data.slice_mut(s![idx..idx + 1, .., ..]))?;
        phase.advance(1);
    }
    drop(phase);

    Ok(data)
}

/// Worker-pool settings for copying frames out of a multi-frame source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParallelOptions {
    pub workers: usize,
    /// Rows per task; defaults to an even split across workers.
    pub chunk_size: Option<usize>,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            chunk_size: None,
        }
    }
}

impl ParallelOptions {
    /// Rows handed to each task when copying `rows` frames.
    pub fn chunk_rows(&self, rows: usize) -> usize {
        let workers = self.workers.max(1);
        self.chunk_size
            .unwrap_or_else(|| rows.div_ceil(workers))
            .max(1)
    }
}

/// Copy `frames` of `source` into a new stack using a fixed-size worker pool.
///
/// The destination is split into contiguous, disjoint row chunks before any
/// task starts; each task decodes and writes only its own rows, so the
/// finished buffer needs no merge step. `path` names the source in errors.
pub fn populate_from_source<T: Pixel>(
    source: &dyn FrameSource,
    path: &Path,
    frames: Range<usize>,
    options: &ParallelOptions,
    progress: &dyn ProgressSink,
    label: &str,
) -> Result<ImageStack<T>> {
    let total = source.frame_count();
    if frames.end > total {
        return Err(LoadError::FrameIndexOutOfRange {
            index: frames.end.saturating_sub(1),
            total,
        });
    }

    let expected = source.frame_shape().frame();
    let rows = frames.len();
    let mut data = allocate_stack::<T>(rows, expected.height(), expected.width())?;
    if rows == 0 {
        return Ok(data);
    }

    let chunk = options.chunk_rows(rows);
    debug!(
        rows,
        chunk,
        workers = options.workers,
        source = %path.display(),
        "Copying frames from stack source"
    );

    let first = frames.start;
    let phase = Phase::start(progress, rows, label);
    let copy_rows = |(chunk_index, mut block): (usize, ArrayViewMut3<'_, T>)| -> Result<()> {
        let start = first + chunk_index * chunk;
        for (offset, row) in block.axis_chunks_iter_mut(Axis(0), 1).enumerate() {
            let pixels = source.frame(start + offset)?;
            pixels
                .cast_into(row)
                .ok_or_else(|| LoadError::ShapeMismatch {
                    path: path.to_path_buf(),
                    expected,
                    actual: ImageShape::Single {
                        height: pixels.dim().1,
                        width: pixels.dim().2,
                    },
                })?;
            phase.advance(1);
        }
        Ok(())
    };

    let tasks: Vec<_> = data
        .axis_chunks_iter_mut(Axis(0), chunk)
        .enumerate()
        .collect();

    if options.workers <= 1 {
        tasks.into_iter().try_for_each(&copy_rows)?;
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()
            .map_err(|e| LoadError::WorkerPool(e.to_string()))?;
        pool.install(|| tasks.into_par_iter().try_for_each(&copy_rows))?;
    }
    drop(phase);

    Ok(data)
}
