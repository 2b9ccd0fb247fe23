pub mod mean;
pub mod populate;

pub use mean::{mean_frame, stats, Stats};
pub use populate::{allocate_stack, populate_files, populate_from_source, ParallelOptions};
