/// Upper bound on HDUs scanned while looking for an image.
pub const FITS_MAX_HDUS: usize = 64;

/// Dataset holding the co-located sample, flat and dark frames in a NeXus file.
pub const NEXUS_DATA_PATH: &str = "entry1/tomo_entry/instrument/detector/data";

/// Trailing frames of a NeXus stack that are references rather than samples.
pub const NEXUS_REFERENCE_FRAMES: usize = 2;

/// Default number of workers used for the parallel copy path.
pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Progress labels.
pub const SAMPLE_LABEL: &str = "Sample";
pub const SAMPLE_PARALLEL_LABEL: &str = "Sample (parallel)";
pub const FLAT_LABEL: &str = "Flat";
pub const DARK_LABEL: &str = "Dark";
